//! Text extraction: uploaded bytes → plain UTF-8 text, best-effort.
//!
//! This stage never fails. A corrupt PDF, an unsupported encoding or a panic
//! inside the PDF library all degrade to "whatever text we got", possibly
//! empty; deciding that empty text is an error is the caller's job.

use pdf_extract::{Document, PlainTextOutput};
use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Whether `filename` should go through the PDF extractor.
pub fn is_pdf_filename(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}

/// Extract plain text from an uploaded file.
///
/// * `*.pdf` (any case) → page-by-page PDF text, pages joined by `\n`
/// * anything else → UTF-8, falling back to Latin-1
pub fn extract_text(bytes: &[u8], filename: &str) -> String {
    if is_pdf_filename(filename) {
        extract_pdf_text(bytes, filename)
    } else {
        decode_text(bytes).into_owned()
    }
}

/// Decode bytes as UTF-8, or as Latin-1 when that fails.
///
/// Latin-1 maps every byte to the code point of the same value, so the
/// fallback cannot fail.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(e) => {
            debug!(
                "Input is not UTF-8 (first bad byte at {}), decoding as Latin-1",
                e.valid_up_to()
            );
            Cow::Owned(bytes.iter().map(|&b| b as char).collect())
        }
    }
}

/// Extract text from PDF bytes, one page at a time.
///
/// `pdf-extract` can panic on malformed documents, so loading and every page
/// run under `catch_unwind`. The first page that errors or panics ends the
/// walk; text from the pages before it is kept.
fn extract_pdf_text(bytes: &[u8], filename: &str) -> String {
    let mut doc = match panic::catch_unwind(|| Document::load_mem(bytes)) {
        Ok(Ok(doc)) => doc,
        Ok(Err(e)) => {
            warn!("{}: PDF could not be loaded: {}", filename, e);
            return String::new();
        }
        Err(_) => {
            warn!("{}: PDF loading panicked", filename);
            return String::new();
        }
    };

    if doc.is_encrypted() {
        if let Err(e) = doc.decrypt("") {
            warn!("{}: PDF is encrypted: {}", filename, e);
            return String::new();
        }
    }

    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    let mut text = String::new();
    let mut extracted = 0;
    for page_num in &pages {
        let mut page = String::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut output = PlainTextOutput::new(&mut page);
            pdf_extract::output_doc_page(&doc, &mut output, *page_num)
        }));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("{}: page {} failed, keeping earlier pages: {}", filename, page_num, e);
                break;
            }
            Err(_) => {
                warn!("{}: page {} panicked, keeping earlier pages", filename, page_num);
                break;
            }
        }
        extracted += 1;
        if !page.is_empty() {
            text.push_str(&page);
            text.push('\n');
        }
    }
    debug!(
        "{}: extracted {}/{} pages, {} chars",
        filename,
        extracted,
        pages.len(),
        text.len()
    );
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_detection_is_case_insensitive() {
        assert!(is_pdf_filename("statement.pdf"));
        assert!(is_pdf_filename("STATEMENT.PDF"));
        assert!(is_pdf_filename("a.b.Pdf"));
        assert!(!is_pdf_filename("statement.pdf.txt"));
        assert!(!is_pdf_filename("statement.csv"));
        assert!(!is_pdf_filename(""));
    }

    #[test]
    fn utf8_text_passes_through() {
        let text = "2024-01-15  NETFLIX.COM  -15.99\n2024-01-20  Café  -4,50 €";
        assert_eq!(extract_text(text.as_bytes(), "jan.csv"), text);
    }

    #[test]
    fn invalid_utf8_falls_back_to_latin1() {
        // "Caf\xe9" is Latin-1 for "Café" and invalid as UTF-8.
        let bytes = b"Caf\xe9 12.00";
        assert_eq!(extract_text(bytes, "statement.txt"), "Café 12.00");
    }

    #[test]
    fn empty_input_yields_empty_text() {
        assert_eq!(extract_text(b"", "empty.txt"), "");
        assert_eq!(extract_text(b"", "empty.pdf"), "");
    }

    #[test]
    fn arbitrary_bytes_never_panic() {
        let noise: Vec<u8> = (0..=255u8).cycle().take(2048).collect();
        let text = extract_text(&noise, "noise.bin");
        assert_eq!(text.chars().count(), 2048);
    }

    #[test]
    fn corrupt_pdf_yields_empty_text() {
        let bytes = b"%PDF-1.7\nthis is not really a pdf\n%%EOF";
        assert_eq!(extract_text(bytes, "broken.pdf"), "");
    }

    /// A Helvetica page showing `text`. Without a MediaBox the page cannot be
    /// laid out and `pdf-extract` panics on it.
    fn page(
        doc: &mut pdf_extract::Document,
        pages_id: pdf_extract::ObjectId,
        text: &str,
        with_media_box: bool,
    ) -> pdf_extract::ObjectId {
        use pdf_extract::{Dictionary, Object, Stream};

        let mut font = Dictionary::new();
        font.set("Type", "Font");
        font.set("Subtype", "Type1");
        font.set("BaseFont", "Helvetica");
        let font_id = doc.add_object(font);
        let mut fonts = Dictionary::new();
        fonts.set("F1", font_id);
        let mut resources = Dictionary::new();
        resources.set("Font", fonts);

        let ops = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
        let content_id = doc.add_object(Stream::new(Dictionary::new(), ops.into_bytes()));

        let mut page = Dictionary::new();
        page.set("Type", "Page");
        page.set("Parent", pages_id);
        page.set("Contents", content_id);
        page.set("Resources", resources);
        if with_media_box {
            let media_box: Vec<Object> = vec![0.into(), 0.into(), 612.into(), 792.into()];
            page.set("MediaBox", media_box);
        }
        doc.add_object(page)
    }

    fn statement_pdf(pages: &[(&str, bool)]) -> Vec<u8> {
        use pdf_extract::{Dictionary, Document, Object};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = pages
            .iter()
            .map(|(text, with_media_box)| page(&mut doc, pages_id, text, *with_media_box).into())
            .collect();
        let mut tree = Dictionary::new();
        tree.set("Type", "Pages");
        tree.set("Count", kids.len() as i64);
        tree.set("Kids", kids);
        doc.set_object(pages_id, tree);

        let mut catalog = Dictionary::new();
        catalog.set("Type", "Catalog");
        catalog.set("Pages", pages_id);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn every_page_is_extracted() {
        let bytes = statement_pdf(&[("NETFLIX 15.99", true), ("SPOTIFY 9.99", true)]);
        let text = extract_text(&bytes, "jan.pdf");
        assert!(text.contains("NETFLIX"), "got: {text:?}");
        assert!(text.contains("SPOTIFY"), "got: {text:?}");
    }

    #[test]
    fn bad_page_keeps_text_from_earlier_pages() {
        let bytes = statement_pdf(&[
            ("NETFLIX 15.99", true),
            ("SPOTIFY 9.99", false),
            ("DISNEY 7.99", true),
        ]);
        let text = extract_text(&bytes, "jan.pdf");
        assert!(text.contains("NETFLIX"), "got: {text:?}");
        assert!(!text.contains("SPOTIFY"));
        assert!(!text.contains("DISNEY"));
    }

    #[test]
    fn non_pdf_bytes_named_pdf_yield_empty_text() {
        assert_eq!(extract_text(b"date,amount\n2024-01-01,9.99", "export.PDF"), "");
    }
}
