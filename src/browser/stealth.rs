//! Page scripts that hide the usual headless-automation markers.
//! Re-applied after every navigation.

const HIDE_WEBDRIVER: &str = r#"
Object.defineProperty(Navigator.prototype, 'webdriver', { get: () => undefined, configurable: true });
"#;

const CHROME_RUNTIME: &str = r#"
if (!window.chrome) {
    window.chrome = { runtime: {}, app: {}, csi: () => {}, loadTimes: () => {} };
}
"#;

const LANGUAGES: &str = r#"
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'], configurable: true });
"#;

const DRIVER_GLOBALS: &str = r#"
for (const key of Object.keys(window)) {
    if (key.startsWith('cdc_')) { delete window[key]; }
}
"#;

/// Evasions in injection order.
pub const STEALTH_SCRIPTS: &[&str] = &[HIDE_WEBDRIVER, CHROME_RUNTIME, LANGUAGES, DRIVER_GLOBALS];
