//! Minimal PDF 1.4 writer for single-font text pages.
//!
//! Output is fully deterministic: no creation dates, no document ids, objects
//! numbered in a fixed order.

use std::fmt::Write as _;

pub struct TextRun {
    pub x: i32,
    pub y: i32,
    pub text: String,
}

pub struct PdfDocument<'a> {
    pub font: &'a str,
    pub font_size: i32,
    pub width: i32,
    pub height: i32,
    pub pages: Vec<Vec<TextRun>>,
}

const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const FONT_ID: usize = 3;
const FIRST_PAGE_ID: usize = 4;

impl PdfDocument<'_> {
    pub fn to_bytes(&self) -> Vec<u8> {
        let page_ids: Vec<usize> = (0..self.pages.len())
            .map(|i| FIRST_PAGE_ID + 2 * i)
            .collect();

        let mut out: Vec<u8> = Vec::with_capacity(1024 + self.pages.len() * 2048);
        let mut offsets: Vec<usize> = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");

        let kids = page_ids
            .iter()
            .map(|id| format!("{id} 0 R"))
            .collect::<Vec<_>>()
            .join(" ");

        push_object(
            &mut out,
            &mut offsets,
            CATALOG_ID,
            format!("<< /Type /Catalog /Pages {PAGES_ID} 0 R >>").as_bytes(),
        );
        push_object(
            &mut out,
            &mut offsets,
            PAGES_ID,
            format!(
                "<< /Type /Pages /Kids [{kids}] /Count {} >>",
                self.pages.len()
            )
            .as_bytes(),
        );
        push_object(
            &mut out,
            &mut offsets,
            FONT_ID,
            format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                self.font
            )
            .as_bytes(),
        );

        for (page, runs) in page_ids.iter().zip(&self.pages) {
            let contents_id = page + 1;
            push_object(
                &mut out,
                &mut offsets,
                *page,
                format!(
                    "<< /Type /Page /Parent {PAGES_ID} 0 R /MediaBox [0 0 {} {}] \
                     /Resources << /Font << /F1 {FONT_ID} 0 R >> >> /Contents {contents_id} 0 R >>",
                    self.width, self.height
                )
                .as_bytes(),
            );

            let stream = self.content_stream(runs);
            let mut body = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
            body.extend_from_slice(&stream);
            body.extend_from_slice(b"\nendstream");
            push_object(&mut out, &mut offsets, contents_id, &body);
        }

        let xref_at = out.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", offsets.len() + 1);
        for off in &offsets {
            let _ = writeln!(xref, "{off:010} 00000 n ");
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {} /Root {CATALOG_ID} 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            offsets.len() + 1
        );
        out.extend_from_slice(xref.as_bytes());
        out
    }

    fn content_stream(&self, runs: &[TextRun]) -> Vec<u8> {
        let mut s = Vec::new();
        for run in runs {
            s.extend_from_slice(
                format!("BT /F1 {} Tf {} {} Td (", self.font_size, run.x, run.y).as_bytes(),
            );
            s.extend_from_slice(&encode_text(&run.text));
            s.extend_from_slice(b") Tj ET\n");
        }
        s
    }
}

// Objects are written in id order, so offsets[id - 1] is the object's position.
fn push_object(out: &mut Vec<u8>, offsets: &mut Vec<usize>, id: usize, body: &[u8]) {
    debug_assert_eq!(offsets.len() + 1, id);
    offsets.push(out.len());
    out.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(b"\nendobj\n");
}

/// Encodes text as a WinAnsi literal string body. Characters the base-14
/// fonts cannot show become `?`.
pub fn encode_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            ' '..='~' => out.push(c as u8),
            '\u{a0}'..='\u{ff}' => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pages: Vec<Vec<TextRun>>) -> Vec<u8> {
        PdfDocument {
            font: "Helvetica",
            font_size: 12,
            width: 595,
            height: 842,
            pages,
        }
        .to_bytes()
    }

    fn run(y: i32, text: &str) -> TextRun {
        TextRun {
            x: 50,
            y,
            text: text.into(),
        }
    }

    #[test]
    fn escapes_pdf_string_delimiters() {
        assert_eq!(encode_text(r"a(b)c\d"), br"a\(b\)c\\d".to_vec());
    }

    #[test]
    fn maps_unsupported_characters_to_question_marks() {
        assert_eq!(encode_text("Crème"), vec![b'C', b'r', 0xE8, b'm', b'e']);
        assert_eq!(encode_text("мука"), b"????".to_vec());
    }

    #[test]
    fn writes_a_well_formed_document() {
        let bytes = doc(vec![vec![run(800, "1. Egg - 2 pcs.")], vec![run(800, "2. Flour - 5 g.")]]);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.4\n"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("/Count 2"));
        assert!(text.contains("/Kids [4 0 R 6 0 R]"));
        assert!(text.contains("BT /F1 12 Tf 50 800 Td (1. Egg - 2 pcs.) Tj ET"));
        assert_eq!(text.matches("/Type /Page /Parent").count(), 2);
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let bytes = doc(vec![vec![run(800, "x")]]);
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let xref_at: usize = text
            .rsplit("startxref\n")
            .next()
            .and_then(|tail| tail.lines().next())
            .unwrap()
            .parse()
            .unwrap();
        assert!(text[xref_at..].starts_with("xref\n0 6\n"));

        let entries: Vec<usize> = text[xref_at..]
            .lines()
            .skip(3)
            .take(5)
            .map(|l| l[..10].parse().unwrap())
            .collect();
        for (i, off) in entries.iter().enumerate() {
            assert!(text[*off..].starts_with(&format!("{} 0 obj", i + 1)));
        }
    }

    #[test]
    fn output_is_deterministic() {
        let a = doc(vec![vec![run(800, "same")]]);
        let b = doc(vec![vec![run(800, "same")]]);
        assert_eq!(a, b);
    }
}
