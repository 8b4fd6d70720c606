/// Message bodies are either plain text or an embedded image carried as a
/// `data:image/...` URL. The server never decodes images; it only needs to
/// tell the two apart when annotating forwarded content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Image,
}

const IMAGE_DATA_PREFIX: &str = "data:image/";

pub fn classify(content: &str) -> ContentKind {
    let head = content.trim_start();
    if head
        .get(..IMAGE_DATA_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(IMAGE_DATA_PREFIX))
    {
        ContentKind::Image
    } else {
        ContentKind::Text
    }
}

/// Wrap forwarded content with its provenance marker.
///
/// Text gets the marker inline. Image data is never touched: the marker goes
/// on its own first line so clients render it separately from the image.
pub fn annotate_forwarded(content: &str, original_sender: &str) -> String {
    match classify(content) {
        ContentKind::Text => format!("Forwarded from {original_sender}: {content}"),
        ContentKind::Image => format!("Forwarded from {original_sender}:\n{}", content.trim_start()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_embedded_images() {
        assert_eq!(classify("data:image/png;base64,iVBORw0KGgo="), ContentKind::Image);
        assert_eq!(classify("  DATA:IMAGE/jpeg;base64,/9j/"), ContentKind::Image);
        assert_eq!(classify("look at data:image/png"), ContentKind::Text);
        assert_eq!(classify("data:"), ContentKind::Text);
        assert_eq!(classify("ünïcödé möré tëxt"), ContentKind::Text);
    }

    #[test]
    fn text_gets_inline_marker() {
        assert_eq!(annotate_forwarded("hello", "alice"), "Forwarded from alice: hello");
    }

    #[test]
    fn image_marker_is_on_its_own_line() {
        let image = "data:image/png;base64,iVBORw0KGgo=";
        let annotated = annotate_forwarded(image, "alice");
        let (marker, body) = annotated.split_once('\n').unwrap();
        assert_eq!(marker, "Forwarded from alice:");
        assert_eq!(body, image);
    }
}
