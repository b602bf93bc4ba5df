/// Maps a language name to the code the translator expects. Unknown names
/// (including codes already) pass through unchanged.
pub fn language_code(name: &str) -> String {
    let code = match name.trim().to_ascii_lowercase().as_str() {
        "english" => "en",
        "japanese" => "ja",
        "chinese" => "zh",
        "korean" => "ko",
        "french" => "fr",
        "german" => "de",
        "spanish" => "es",
        "italian" => "it",
        "portuguese" => "pt",
        "russian" => "ru",
        _ => return name.trim().to_string(),
    };
    code.to_string()
}
