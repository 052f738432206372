use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;

use super::{
    model::AggregateLine,
    pdf::{PdfDocument, TextRun},
};
use crate::config::RenderConfig;

pub const EMPTY_LIST_MESSAGE: &str = "Shopping list is empty.";

pub const TEXT_FILENAME: &str = "shopping_list.txt";
pub const PDF_FILENAME: &str = "shoppingcart.pdf";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListFormat {
    #[default]
    #[serde(alias = "text")]
    Txt,
    Pdf,
}

impl ListFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ListFormat::Txt => "text/plain",
            ListFormat::Pdf => "application/pdf",
        }
    }

    pub fn filename(self) -> &'static str {
        match self {
            ListFormat::Txt => TEXT_FILENAME,
            ListFormat::Pdf => PDF_FILENAME,
        }
    }
}

/// A rendered shopping list, served as a download.
#[derive(Debug)]
pub struct RenderedList {
    pub body: Bytes,
    pub content_type: &'static str,
    pub filename: &'static str,
}

impl IntoResponse for RenderedList {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, self.content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", self.filename),
                ),
            ],
            self.body,
        )
            .into_response()
    }
}

/// One line of text positioned on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedLine {
    pub y: i32,
    pub text: String,
}

pub struct ListRenderer {
    config: RenderConfig,
}

impl ListRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn render(&self, lines: &[AggregateLine], format: ListFormat) -> RenderedList {
        let body = match format {
            ListFormat::Txt => Bytes::from(render_text(lines)),
            ListFormat::Pdf => Bytes::from(self.render_pdf(lines)),
        };
        RenderedList {
            body,
            content_type: format.content_type(),
            filename: format.filename(),
        }
    }

    /// Splits the list into pages.
    ///
    /// The cursor moves down one line height after each line; once it is at or
    /// below the bottom margin the page is closed and the next line, if any,
    /// starts a fresh page at the top offset.
    pub fn layout(&self, lines: &[AggregateLine]) -> Vec<Vec<PlacedLine>> {
        let c = &self.config;
        if lines.is_empty() {
            return vec![vec![PlacedLine {
                y: c.top_offset,
                text: EMPTY_LIST_MESSAGE.to_string(),
            }]];
        }

        let mut pages = Vec::new();
        let mut current = Vec::new();
        let mut y = c.top_offset;
        for (idx, line) in lines.iter().enumerate() {
            current.push(PlacedLine {
                y,
                text: format!(
                    "{}. {} - {} {}.",
                    idx + 1,
                    line.ingredient.name,
                    line.total_amount,
                    line.ingredient.unit
                ),
            });
            y -= c.line_height;
            if y <= c.bottom_margin {
                pages.push(std::mem::take(&mut current));
                y = c.top_offset;
            }
        }
        if !current.is_empty() {
            pages.push(current);
        }
        pages
    }

    fn render_pdf(&self, lines: &[AggregateLine]) -> Vec<u8> {
        let c = &self.config;
        let pages = self
            .layout(lines)
            .into_iter()
            .map(|page| {
                page.into_iter()
                    .map(|l| TextRun {
                        x: c.left_margin,
                        y: l.y,
                        text: l.text,
                    })
                    .collect()
            })
            .collect();

        PdfDocument {
            font: &c.font,
            font_size: c.font_size,
            width: c.page_width,
            height: c.page_height,
            pages,
        }
        .to_bytes()
    }
}

pub fn render_text(lines: &[AggregateLine]) -> String {
    if lines.is_empty() {
        return format!("{EMPTY_LIST_MESSAGE}\n");
    }
    let mut out = String::new();
    for l in lines {
        out.push_str(&format!(
            "{} {} {}\n",
            l.ingredient.name, l.ingredient.unit, l.total_amount
        ));
    }
    out
}
