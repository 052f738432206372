use std::{fmt::Display, str::FromStr};

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Page geometry and font used by the shopping list PDF renderer.
///
/// Coordinates are PDF points measured from the bottom-left corner of the page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenderConfig {
    /// Base-14 font name, e.g. `Helvetica` or `Courier`.
    pub font: String,
    pub font_size: i32,
    pub page_width: i32,
    pub page_height: i32,
    pub left_margin: i32,
    pub top_offset: i32,
    pub line_height: i32,
    pub bottom_margin: i32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font: "Helvetica".into(),
            font_size: 14,
            page_width: 595,
            page_height: 842,
            left_margin: 50,
            top_offset: 800,
            line_height: 20,
            bottom_margin: 40,
        }
    }
}

impl RenderConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let d = Self::default();
        let cfg = Self {
            font: std::env::var("LIST_FONT").unwrap_or(d.font),
            font_size: env_or("LIST_FONT_SIZE", d.font_size)?,
            page_width: d.page_width,
            page_height: d.page_height,
            left_margin: env_or("LIST_LEFT_MARGIN", d.left_margin)?,
            top_offset: env_or("LIST_TOP_OFFSET", d.top_offset)?,
            line_height: env_or("LIST_LINE_HEIGHT", d.line_height)?,
            bottom_margin: env_or("LIST_BOTTOM_MARGIN", d.bottom_margin)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.font.is_empty()
            || !self
                .font
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            anyhow::bail!("font name {:?} is not a valid PDF name", self.font);
        }
        if self.font_size <= 0 {
            anyhow::bail!("font size must be positive");
        }
        if self.line_height <= 0 {
            anyhow::bail!("line height must be positive");
        }
        if self.bottom_margin < 0 || self.bottom_margin >= self.top_offset {
            anyhow::bail!(
                "bottom margin {} must be below top offset {}",
                self.bottom_margin,
                self.top_offset
            );
        }
        if self.top_offset > self.page_height {
            anyhow::bail!("top offset {} is off the page", self.top_offset);
        }
        if self.left_margin < 0 || self.left_margin >= self.page_width {
            anyhow::bail!("left margin {} is off the page", self.left_margin);
        }
        Ok(())
    }

    /// Number of lines that fit on one page before a break.
    pub fn page_capacity(&self) -> usize {
        let span = self.top_offset - self.bottom_margin;
        ((span + self.line_height - 1) / self.line_height) as usize
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub render: RenderConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "recipebook".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "recipebook-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60)?,
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14)?,
        };
        let render = RenderConfig::from_env().context("invalid shopping list layout")?;
        Ok(Self {
            database_url,
            jwt,
            render,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key} value {raw:?}: {e}")),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_valid() {
        let cfg = RenderConfig::default();
        cfg.validate().expect("defaults validate");
        assert_eq!(cfg.page_capacity(), 38);
    }

    #[test]
    fn capacity_counts_the_line_that_touches_the_margin() {
        let cfg = RenderConfig {
            top_offset: 100,
            line_height: 10,
            bottom_margin: 70,
            ..RenderConfig::default()
        };
        // 100 -> 90 -> 80 -> 70: the third line lands the cursor on the margin
        assert_eq!(cfg.page_capacity(), 3);

        let cfg = RenderConfig {
            bottom_margin: 69,
            ..cfg
        };
        assert_eq!(cfg.page_capacity(), 4);
    }

    #[test]
    fn rejects_bad_geometry() {
        let bad_line = RenderConfig {
            line_height: 0,
            ..RenderConfig::default()
        };
        assert!(bad_line.validate().is_err());

        let inverted = RenderConfig {
            bottom_margin: 900,
            ..RenderConfig::default()
        };
        assert!(inverted.validate().is_err());

        let off_page = RenderConfig {
            top_offset: 1000,
            ..RenderConfig::default()
        };
        assert!(off_page.validate().is_err());
    }

    #[test]
    fn rejects_font_names_that_break_pdf_syntax() {
        let cfg = RenderConfig {
            font: "Times Roman/".into(),
            ..RenderConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = RenderConfig {
            font: "Courier-Bold".into(),
            ..RenderConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }
}
