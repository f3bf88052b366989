use std::fmt;
use std::fs;
use std::ops::{Range, RangeInclusive};
use std::path::Path;

use crate::category::category_name;
use crate::params::{Assignment, ParamSpecs};
use crate::{ForgeError, Result};

pub const PATCH_SIZE: usize = 176;

pub const SIGNATURE: [u8; 5] = [0xF0, 0x00, 0x21, 0x22, 0x4D];
pub const SUB_ID: [u8; 3] = [0x02, 0x03, 0x09];
pub const NAME_OFFSET: usize = 8;
pub const NAME_LEN: usize = 8;
pub const CATEGORY_OFFSET: usize = 16;
pub const RESERVED: Range<usize> = 17..20;
pub const PARAM_REGION: RangeInclusive<usize> = 20..=174;
pub const TERMINATOR: u8 = 0xF7;

const NAME_PAD: u8 = 0x20;

/// One 176-byte patch frame.
#[derive(Clone, PartialEq, Eq)]
pub struct Record([u8; PATCH_SIZE]);

impl Record {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let frame: [u8; PATCH_SIZE] = bytes
            .try_into()
            .map_err(|_| ForgeError::RecordSize(bytes.len()))?;
        Ok(Self(frame))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Name field with trailing spaces and NULs stripped.
    pub fn name(&self) -> String {
        let raw = &self.0[NAME_OFFSET..NAME_OFFSET + NAME_LEN];
        String::from_utf8_lossy(raw)
            .trim_end_matches([' ', '\0'])
            .to_string()
    }

    pub fn category_code(&self) -> u8 {
        self.0[CATEGORY_OFFSET]
    }

    pub fn category_name(&self) -> &'static str {
        category_name(self.category_code())
    }

    /// Left-justified, space padded, cut at 8 bytes.
    pub fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        for i in 0..NAME_LEN {
            self.0[NAME_OFFSET + i] = bytes.get(i).copied().unwrap_or(NAME_PAD);
        }
    }

    pub fn set_category(&mut self, code: u8) {
        self.0[CATEGORY_OFFSET] = code;
    }

    pub fn decode(&self) -> DecodedPatch {
        DecodedPatch {
            name: self.name(),
            category_code: self.category_code(),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("name", &self.name())
            .field("category", &self.category_name())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPatch {
    pub name: String,
    pub category_code: u8,
}

impl DecodedPatch {
    pub fn category_name(&self) -> &'static str {
        category_name(self.category_code)
    }
}

pub fn decode(bytes: &[u8]) -> Result<DecodedPatch> {
    Ok(Record::from_bytes(bytes)?.decode())
}

/// Cuts a display name to the 8-byte name field without splitting a
/// multi-byte character.
pub fn truncate_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if out.len() + ch.len_utf8() > NAME_LEN {
            break;
        }
        out.push(ch);
    }
    out
}

/// Builds patches on top of the device's init template. Bytes the layout
/// does not own are always inherited from the template.
#[derive(Debug, Clone)]
pub struct PatchCodec {
    template: Record,
}

impl PatchCodec {
    pub fn new(template: &[u8]) -> Result<Self> {
        Ok(Self {
            template: Record::from_bytes(template)?,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path).map_err(|err| {
            ForgeError::Config(format!(
                "failed to read init template '{}': {err}",
                path.display()
            ))
        })?;
        Self::new(&raw)
    }

    pub fn template(&self) -> &Record {
        &self.template
    }

    pub fn encode(
        &self,
        name: &str,
        category: u8,
        values: &Assignment,
        specs: &ParamSpecs,
    ) -> Result<Record> {
        let mut record = self.template.clone();
        let frame = &mut record.0;

        frame[..SIGNATURE.len()].copy_from_slice(&SIGNATURE);
        frame[SIGNATURE.len()..NAME_OFFSET].copy_from_slice(&SUB_ID);
        frame[CATEGORY_OFFSET] = category;
        frame[RESERVED].fill(0);

        for (param, value) in values {
            let spec = specs.get(param).ok_or_else(|| {
                ForgeError::Config(format!("parameter '{param}' has no spec entry"))
            })?;
            // Values are single bytes on the device even where the spec
            // declares a wider field.
            frame[spec.sysex_offset] = *value as u8;
        }

        frame[PATCH_SIZE - 1] = TERMINATOR;
        record.set_name(name);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamSpec;

    fn template() -> Vec<u8> {
        (0..PATCH_SIZE).map(|i| (i as u8).wrapping_mul(7) ^ 0x5A).collect()
    }

    fn spec(offset: usize) -> ParamSpec {
        ParamSpec {
            min: 0,
            max: 127,
            default: 0,
            sysex_offset: offset,
            sysex_length: 2,
            scale: String::new(),
            unit: String::new(),
            section: String::new(),
        }
    }

    #[test]
    fn encode_then_decode_keeps_name_and_category() {
        let codec = PatchCodec::new(&template()).unwrap();
        let specs = ParamSpecs::from([("cutoff".to_string(), spec(40))]);
        let values = Assignment::from([("cutoff".to_string(), 99)]);

        let record = codec.encode("Shiny", 0x03, &values, &specs).unwrap();
        let decoded = decode(record.as_bytes()).unwrap();
        assert_eq!(decoded.name, "Shiny");
        assert_eq!(decoded.category_code, 0x03);
        assert_eq!(decoded.category_name(), "Keys");
    }

    #[test]
    fn encode_writes_fixed_layout_and_inherits_the_rest() {
        let tpl = template();
        let codec = PatchCodec::new(&tpl).unwrap();
        let specs = ParamSpecs::from([
            ("a".to_string(), spec(20)),
            ("b".to_string(), spec(100)),
        ]);
        let values = Assignment::from([("a".to_string(), 1), ("b".to_string(), 300)]);

        let record = codec.encode("Ab", 0x0B, &values, &specs).unwrap();
        let bytes = record.as_bytes();

        assert_eq!(&bytes[0..5], &SIGNATURE);
        assert_eq!(&bytes[5..8], &SUB_ID);
        assert_eq!(&bytes[8..16], b"Ab      ");
        assert_eq!(bytes[16], 0x0B);
        assert_eq!(&bytes[17..20], &[0, 0, 0]);
        assert_eq!(bytes[20], 1);
        // Truncated to one byte, the neighbouring byte stays untouched.
        assert_eq!(bytes[100], 300u16 as u8);
        assert_eq!(bytes[101], tpl[101]);
        assert_eq!(bytes[175], TERMINATOR);

        for offset in 21..175 {
            if offset != 100 {
                assert_eq!(bytes[offset], tpl[offset], "offset {offset}");
            }
        }
    }

    #[test]
    fn unknown_category_codes_are_kept() {
        let codec = PatchCodec::new(&template()).unwrap();
        let record = codec
            .encode("Odd", 0x7E, &Assignment::new(), &ParamSpecs::new())
            .unwrap();
        assert_eq!(record.category_code(), 0x7E);
        assert_eq!(record.category_name(), "Unknown");
    }

    #[test]
    fn decode_strips_trailing_spaces_and_nuls() {
        let mut raw = template();
        raw[8..16].copy_from_slice(b"Bass\0 \0 ");
        assert_eq!(decode(&raw).unwrap().name, "Bass");
    }

    #[test]
    fn wrong_sizes_are_layout_errors() {
        assert!(matches!(
            PatchCodec::new(&[0u8; 100]),
            Err(ForgeError::RecordSize(100))
        ));
        assert!(matches!(
            decode(&[0u8; 177]),
            Err(ForgeError::RecordSize(177))
        ));
    }

    #[test]
    fn encode_rejects_parameter_without_spec() {
        let codec = PatchCodec::new(&template()).unwrap();
        let values = Assignment::from([("ghost".to_string(), 1)]);
        assert!(codec
            .encode("x", 0, &values, &ParamSpecs::new())
            .is_err());
    }

    #[test]
    fn truncate_name_respects_field_width() {
        assert_eq!(truncate_name("Wonderful"), "Wonderfu");
        assert_eq!(truncate_name("short"), "short");
        assert_eq!(truncate_name("ééééé"), "éééé");
    }
}
