//! Code page to codec registry
//!
//! Maps Windows console code pages to `encoding_rs` codecs. The table is
//! process-wide: it starts with the defaults below and may be extended with
//! [`register`] before any session is created. Sessions copy their codec out
//! at construction and never consult the table again.

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use encoding_rs::{CoderResult, Encoding};
use tracing::{debug, trace};

use super::error::{Result, ShellError};

/// UTF-8 code page
pub const CP_UTF8: u32 = 65001;

static REGISTRY: OnceLock<RwLock<HashMap<u32, Codec>>> = OnceLock::new();

/// Entries present before any caller registers more
fn default_codecs() -> [(u32, &'static Encoding); 5] {
    [
        (932, encoding_rs::SHIFT_JIS),
        (936, encoding_rs::GBK),
        (949, encoding_rs::EUC_KR),
        (950, encoding_rs::BIG5),
        (CP_UTF8, encoding_rs::UTF_8),
    ]
}

fn registry() -> &'static RwLock<HashMap<u32, Codec>> {
    REGISTRY.get_or_init(|| {
        let table = default_codecs()
            .into_iter()
            .map(|(cp, encoding)| (cp, Codec::new(encoding)))
            .collect();
        RwLock::new(table)
    })
}

/// Look up the codec for a code page
pub fn lookup(code_page: u32) -> Option<Codec> {
    registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&code_page)
        .copied()
}

/// Add or replace a registry entry
pub fn register(code_page: u32, codec: Codec) {
    debug!("Registering code page {} as {}", code_page, codec.name());
    registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(code_page, codec);
}

/// Add a registry entry by WHATWG encoding label (e.g. `"windows-1252"`)
pub fn register_label(code_page: u32, label: &str) -> Result<()> {
    let codec = Codec::for_label(label).ok_or_else(|| ShellError::UnknownEncodingLabel {
        code_page,
        label: label.to_string(),
    })?;
    register(code_page, codec);
    Ok(())
}

/// All registered code pages, ascending
pub fn registered_code_pages() -> Vec<u32> {
    let mut pages: Vec<u32> = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .copied()
        .collect();
    pages.sort_unstable();
    pages
}

/// A text codec for one code page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    encoding: &'static Encoding,
}

impl Codec {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self { encoding }
    }

    pub fn for_label(label: &str) -> Option<Self> {
        Encoding::for_label(label.as_bytes()).map(Self::new)
    }

    /// Byte-preserving codec used before the code page is known.
    ///
    /// `x-user-defined` maps every byte to its own char and leaves ASCII
    /// untouched, so output in any locale decodes without error.
    pub fn transparent() -> Self {
        Self::new(encoding_rs::X_USER_DEFINED)
    }

    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Encode text, or `None` if it holds characters the codec cannot represent
    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        let (bytes, _, had_unmappable) = self.encoding.encode(text);
        if had_unmappable {
            None
        } else {
            Some(bytes.into_owned())
        }
    }

    /// Fresh incremental decoder
    pub fn new_decoder(&self) -> StreamDecoder {
        StreamDecoder {
            inner: self.encoding.new_decoder_without_bom_handling(),
        }
    }
}

/// Output size for a chunk overflowed `usize`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOverflow;

/// Incremental decoder that keeps partial multi-byte sequences between calls
pub struct StreamDecoder {
    inner: encoding_rs::Decoder,
}

impl StreamDecoder {
    /// Decode one chunk and append it to `dst`.
    ///
    /// A trailing incomplete sequence is held back until the next chunk.
    /// Malformed sequences become U+FFFD so the stream stays aligned.
    pub fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
    ) -> std::result::Result<(), DecodeOverflow> {
        let mut consumed = 0;
        loop {
            let needed = self
                .inner
                .max_utf8_buffer_length(src.len() - consumed)
                .ok_or(DecodeOverflow)?;
            dst.reserve(needed);

            let (result, read, replaced) =
                self.inner.decode_to_string(&src[consumed..], dst, false);
            consumed += read;
            if replaced {
                trace!("Replaced malformed input in {}", self.inner.encoding().name());
            }

            match result {
                CoderResult::InputEmpty => return Ok(()),
                CoderResult::OutputFull => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_entries() {
        assert_eq!(lookup(CP_UTF8).map(|c| c.name()), Some("UTF-8"));
        assert_eq!(lookup(932).map(|c| c.name()), Some("Shift_JIS"));
        assert_eq!(lookup(949).map(|c| c.name()), Some("EUC-KR"));
        assert!(lookup(437).is_none());

        let pages = registered_code_pages();
        for cp in [932, 936, 949, 950, CP_UTF8] {
            assert!(pages.contains(&cp), "missing {}", cp);
        }
    }

    #[test]
    fn test_register_label() {
        register_label(1252, "windows-1252").unwrap();
        assert_eq!(lookup(1252).map(|c| c.name()), Some("windows-1252"));

        match register_label(1253, "no-such-encoding") {
            Err(ShellError::UnknownEncodingLabel { code_page, label }) => {
                assert_eq!(code_page, 1253);
                assert_eq!(label, "no-such-encoding");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(lookup(1253).is_none());
    }

    #[test]
    fn test_shift_jis_roundtrip() {
        let codec = lookup(932).unwrap();
        let bytes = codec.encode("こんにちは").unwrap();
        assert_eq!(bytes.len(), 10);

        let mut out = String::new();
        codec.new_decoder().decode(&bytes, &mut out).unwrap();
        assert_eq!(out, "こんにちは");
    }

    #[test]
    fn test_unmappable_text_fails_to_encode() {
        let codec = lookup(932).unwrap();
        assert!(codec.encode("emoji 😀").is_none());
        assert!(Codec::transparent().encode("é").is_none());
        assert_eq!(Codec::transparent().encode("chcp"), Some(b"chcp".to_vec()));
    }

    #[test]
    fn test_partial_sequence_spans_chunks() {
        let codec = lookup(CP_UTF8).unwrap();
        let bytes = "日本".as_bytes();
        let mut decoder = codec.new_decoder();
        let mut out = String::new();

        for b in bytes {
            decoder.decode(std::slice::from_ref(b), &mut out).unwrap();
        }
        assert_eq!(out, "日本");
    }

    #[test]
    fn test_malformed_input_is_replaced() {
        let codec = lookup(CP_UTF8).unwrap();
        let mut decoder = codec.new_decoder();
        let mut out = String::new();
        decoder.decode(b"ok\xff", &mut out).unwrap();
        decoder.decode(b" caf\xe9 done", &mut out).unwrap();
        assert_eq!(out, "ok\u{FFFD} caf\u{FFFD} done");
    }

    #[test]
    fn test_transparent_keeps_ascii_in_any_locale() {
        // "現在のコード ページ: 932" as Shift_JIS bytes
        let (sjis, _, _) = encoding_rs::SHIFT_JIS.encode("現在のコード ページ: 932\r\n");
        let mut out = String::new();
        Codec::transparent().new_decoder().decode(&sjis, &mut out).unwrap();
        assert!(out.ends_with(": 932\r\n"));
    }
}
