/// Snapshot a value as JSON with the time-varying `loaded_at` field masked.
#[macro_export]
macro_rules! snapshot_redacted {
    ($value:expr, @$snap:literal) => {{
        let mut settings = insta::Settings::clone_current();
        settings.add_redaction(".loaded_at", "[timestamp]");
        settings.add_redaction(".**.loaded_at", "[timestamp]");
        settings.bind(|| {
            insta::assert_json_snapshot!($value, @$snap);
        });
    }};
}
