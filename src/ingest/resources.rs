use once_cell::sync::Lazy;
use regex::Regex;

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("markup pattern"));

fn path_part(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Extension of the final path segment, leading dot included (`.jpg`).
pub fn resource_extension(url: &str) -> Option<String> {
    let path = path_part(url.trim());
    let segment_start = path.rfind('/').map(|idx| idx + 1).unwrap_or(0);
    let dot = path.rfind('.')?;
    if dot < segment_start || dot + 1 >= path.len() {
        return None;
    }
    Some(path[dot..].to_string())
}

/// File name after the last `/`.
pub fn resource_name(url: &str) -> Option<String> {
    let path = path_part(url.trim());
    let slash = path.rfind('/')?;
    let name = &path[slash + 1..];
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Removes HTML tags and the common entities exporters leave in descriptions.
pub fn strip_markup(input: &str) -> String {
    let without_tags = MARKUP.replace_all(input, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_and_name_come_from_the_last_segment() {
        let url = "http://cdn.example.com/images/lamp.large.jpg";
        assert_eq!(resource_extension(url).as_deref(), Some(".jpg"));
        assert_eq!(resource_name(url).as_deref(), Some("lamp.large.jpg"));
    }

    #[test]
    fn dots_in_the_host_are_not_extensions() {
        assert_eq!(resource_extension("http://cdn.example.com/images/lamp"), None);
        assert_eq!(
            resource_name("http://cdn.example.com/images/lamp").as_deref(),
            Some("lamp")
        );
    }

    #[test]
    fn query_strings_are_ignored() {
        let url = "https://cdn.example.com/a/b.png?v=3#top";
        assert_eq!(resource_extension(url).as_deref(), Some(".png"));
        assert_eq!(resource_name(url).as_deref(), Some("b.png"));
        assert_eq!(resource_name("no-slash.png"), None);
    }

    #[test]
    fn markup_is_stripped() {
        assert_eq!(
            strip_markup("<p>Warm <b>white</b>&nbsp;light &amp; dimmer</p>\n"),
            "Warm white light & dimmer"
        );
        assert_eq!(strip_markup("<br/>"), "");
    }
}
