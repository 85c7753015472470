//! Request language detection

use axum::http::{header, HeaderMap};

/// Cookie holding the UI locale
pub const LOCALE_COOKIE: &str = "NEXT_LOCALE";

const DEFAULT_LANG: &str = "en";

/// Language to ask the external service for
///
/// An explicit, non-blank `lang` in the request body wins; then the locale
/// cookie; then `Accept-Language`, which selects `zh` for simplified Chinese
/// and `en` for everything else.
pub fn request_lang(explicit: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(lang) = explicit.map(str::trim).filter(|l| !l.is_empty()) {
        return lang.to_string();
    }

    if let Some(lang) = locale_cookie(headers) {
        return lang;
    }

    let accept = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if accept.contains("zh-CN")
        || accept.contains("zh-Hans")
        || (accept.contains("zh") && !accept.contains("zh-TW"))
    {
        return "zh".to_string();
    }

    DEFAULT_LANG.to_string()
}

fn locale_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == LOCALE_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
