//! Cover image format detection by magic bytes.

use derive_more::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    #[display("PNG")]
    Png,
    #[display("JPEG")]
    Jpeg,
    #[display("GIF")]
    Gif,
    #[display("WebP")]
    WebP,
}

impl ImageFormat {
    /// Identify an image from its leading bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        match data {
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(Self::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }
}

/// File extension for stored cover bytes of unknown format.
pub(crate) const UNKNOWN_EXTENSION: &str = "bin";
/// Media type served for cover bytes of unknown format.
pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::png(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR", Some(ImageFormat::Png))]
    #[case::jpeg(b"\xFF\xD8\xFF\xE0\0\x10JFIF", Some(ImageFormat::Jpeg))]
    #[case::gif87(b"GIF87a\x01\0", Some(ImageFormat::Gif))]
    #[case::gif89(b"GIF89a\x01\0", Some(ImageFormat::Gif))]
    #[case::webp(b"RIFF\x24\0\0\0WEBPVP8 ", Some(ImageFormat::WebP))]
    #[case::riff_but_not_webp(b"RIFF\x24\0\0\0WAVEfmt ", None)]
    #[case::truncated_png(b"\x89PNG", None)]
    #[case::text(b"not an image", None)]
    #[case::empty(b"", None)]
    fn test_sniff(#[case] data: &[u8], #[case] expected: Option<ImageFormat>) {
        assert_eq!(ImageFormat::sniff(data), expected);
    }
}
