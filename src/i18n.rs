// ==========================================
// Internationalisation (i18n)
// ==========================================
// Backed by rust-i18n; locales/vi.yml and locales/en.yml.
// Violation codes and field names never go through here,
// only the human-readable messages attached to them.
// ==========================================
// Note: the rust_i18n::i18n! macro is invoked in lib.rs
// ==========================================

/// Locale used when settings do not name one.
pub const DEFAULT_LOCALE: &str = "vi";

/// Current locale
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// Set the locale
///
/// # Parameters
/// - locale: "vi" or "en"
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// Translate a message without arguments
///
/// # Example
/// ```no_run
/// use coffee_etl::i18n::t;
/// let msg = t("violation.blank");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// Translate a message, replacing `%{name}` placeholders
///
/// # Example
/// ```no_run
/// use coffee_etl::i18n::t_with_args;
/// let msg = t_with_args("violation.too_long", &[("max", "50")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The locale is process-global and tests run in parallel.
    static LOCALE_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_set_locale() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("en");
        assert_eq!(current_locale(), "en");

        set_locale(DEFAULT_LOCALE);
        assert_eq!(current_locale(), "vi");
    }

    #[test]
    fn test_translate_simple() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("vi");
        assert_eq!(t("violation.blank"), "Không rỗng");

        set_locale("en");
        assert_eq!(t("violation.blank"), "Must not be blank");

        set_locale(DEFAULT_LOCALE);
    }

    #[test]
    fn test_translate_with_args() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("vi");
        let msg = t_with_args("violation.too_long", &[("max", "50")]);
        assert_eq!(msg, "Tối đa 50 ký tự");

        set_locale("en");
        let msg = t_with_args("violation.unknown_reference", &[("target", "menu_item")]);
        assert_eq!(msg, "Does not exist in menu_item");

        set_locale(DEFAULT_LOCALE);
    }
}
