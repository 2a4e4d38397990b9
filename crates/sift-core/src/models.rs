//! Data models for Sift
//!
//! These mirror the JSON the processing service returns. The service is
//! loose about types (ids and totals arrive as numbers or strings, lists as
//! `null`), so deserialization is lenient and every field except the
//! structure itself is optional or defaulted.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::error::{Error, Result};

/// Treat an explicit JSON `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Server-assigned receipt identifier (number or string on the wire)
///
/// Ids compare by their text, so `7` and `"7"` name the same receipt. The
/// wire form is kept so an id is written back the way it arrived.
#[derive(Debug, Clone)]
pub struct ReceiptId {
    text: String,
    numeric: bool,
}

impl ReceiptId {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn from_text(s: &str) -> Self {
        Self {
            text: s.trim().to_string(),
            numeric: false,
        }
    }
}

impl PartialEq for ReceiptId {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for ReceiptId {}

impl std::hash::Hash for ReceiptId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl PartialOrd for ReceiptId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReceiptId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.text.cmp(&other.text)
    }
}

impl fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for ReceiptId {
    fn from(s: &str) -> Self {
        Self::from_text(s)
    }
}

impl From<String> for ReceiptId {
    fn from(s: String) -> Self {
        Self::from_text(&s)
    }
}

impl From<i64> for ReceiptId {
    fn from(n: i64) -> Self {
        Self {
            text: n.to_string(),
            numeric: true,
        }
    }
}

impl std::str::FromStr for ReceiptId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("Receipt id cannot be empty".to_string());
        }
        Ok(Self::from_text(s))
    }
}

impl Serialize for ReceiptId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.text.parse::<i64>() {
            Ok(n) if self.numeric => serializer.serialize_i64(n),
            _ => serializer.serialize_str(&self.text),
        }
    }
}

impl<'de> Deserialize<'de> for ReceiptId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Int(n) => Ok(Self::from(n)),
            RawId::Text(s) if !s.trim().is_empty() => Ok(Self::from_text(&s)),
            RawId::Text(_) => Err(serde::de::Error::custom("empty receipt id")),
        }
    }
}

/// Receipt total as transmitted (text or number), parsed on demand
#[derive(Debug, Clone, PartialEq)]
pub struct Amount(String);

impl Amount {
    pub fn raw(&self) -> &str {
        &self.0
    }

    /// Numeric value, `None` when the text holds no number
    pub fn value(&self) -> Option<f64> {
        parse_amount(&self.0)
    }
}

impl From<f64> for Amount {
    fn from(v: f64) -> Self {
        Self(v.to_string())
    }
}

impl From<&str> for Amount {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawAmount {
            Number(serde_json::Number),
            Text(String),
        }

        Ok(match RawAmount::deserialize(deserializer)? {
            RawAmount::Number(n) => Self(n.to_string()),
            RawAmount::Text(s) => Self(s),
        })
    }
}

/// Extract the first number from free text ("$1,234.50", "12.00 INR", "-3")
pub fn parse_amount(text: &str) -> Option<f64> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| {
        Regex::new(r"-?(?:\d[\d,]*(?:\.\d+)?|\.\d+)").expect("valid regex")
    });

    let m = re.find(text)?;
    let value: f64 = m.as_str().replace(',', "").parse().ok()?;
    value.is_finite().then_some(value)
}

/// Review status of a stored receipt
///
/// Read case-insensitively; a value the client does not know is treated as
/// pending so one odd row cannot sink a whole listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    /// Awaiting admin review
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Approved and rejected receipts cannot be acted on again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::str::FromStr for ReceiptStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Unknown receipt status: {}", s)),
        }
    }
}

impl<'de> Deserialize<'de> for ReceiptStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_else(|e: String| {
            warn!(status = %raw, error = %e, "Treating unknown receipt status as pending");
            Self::Pending
        }))
    }
}

/// Outcome of the GST number check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GstVerification {
    Valid,
    Invalid,
    /// The check could not decide; the message says why
    Indeterminate(String),
}

impl GstVerification {
    pub fn label(&self) -> String {
        match self {
            Self::Valid => "Valid".to_string(),
            Self::Invalid => "Invalid".to_string(),
            Self::Indeterminate(msg) if msg.is_empty() => "Unverified".to_string(),
            Self::Indeterminate(msg) => format!("Unverified ({})", msg),
        }
    }
}

impl Serialize for GstVerification {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let value = match self {
            Self::Valid => serde_json::json!({ "valid": true }),
            Self::Invalid => serde_json::json!({ "valid": false }),
            Self::Indeterminate(msg) => serde_json::json!({ "valid": null, "message": msg }),
        };
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GstVerification {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde_json::Value;

        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Bool(true) => Self::Valid,
            Value::Bool(false) => Self::Invalid,
            Value::String(s) => match s.to_lowercase().as_str() {
                "valid" | "verified" => Self::Valid,
                "invalid" => Self::Invalid,
                _ => Self::Indeterminate(s),
            },
            Value::Object(map) => {
                let message = ["message", "reason", "detail"]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_str))
                    .unwrap_or_default()
                    .to_string();
                match map.get("valid").and_then(Value::as_bool) {
                    Some(true) => Self::Valid,
                    Some(false) => Self::Invalid,
                    None => Self::Indeterminate(message),
                }
            }
            other => Self::Indeterminate(other.to_string()),
        })
    }
}

/// A processed receipt record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Absent when the service reports the id beside the record instead
    #[serde(default)]
    pub id: Option<ReceiptId>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub total: Option<Amount>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: ReceiptStatus,
    #[serde(default, alias = "duplicate", deserialize_with = "null_as_default")]
    pub is_duplicate: bool,
    #[serde(default)]
    pub duplicate_of: Option<ReceiptId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fraud_flags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub raw_text: String,
    /// Extraction service output, passed through untouched
    #[serde(default, alias = "deepseek_raw")]
    pub parsed_fields: serde_json::Value,
    #[serde(default)]
    pub gst_number: Option<String>,
    #[serde(default)]
    pub gst_verification: Option<GstVerification>,
}

impl Receipt {
    /// Numeric total; missing or unparsable totals count as zero
    pub fn amount(&self) -> f64 {
        self.total.as_ref().and_then(Amount::value).unwrap_or(0.0)
    }

    /// The receipt this one duplicates, if the flag and a valid reference
    /// are both present. A self-reference is ignored.
    pub fn duplicate_target(&self) -> Option<&ReceiptId> {
        if !self.is_duplicate {
            return None;
        }
        let target = self.duplicate_of.as_ref()?;
        match &self.id {
            Some(id) if id == target => None,
            _ => Some(target),
        }
    }

    pub fn merchant_or_unknown(&self) -> &str {
        self.merchant
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("Unknown")
    }

    /// Receipt date interpreted as a calendar date
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        const FORMATS: &[&str] = &[
            "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d %b %Y", "%b %d, %Y",
        ];
        let date = self.date.as_deref()?.trim();
        // Timestamps: keep only the date part
        let date = date.split(['T', ' ']).next().filter(|d| d.len() == 10).unwrap_or(date);
        FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(date, fmt).ok())
    }

    /// Ordered label/value rows describing this receipt for display
    pub fn summary_rows(&self) -> Vec<(&'static str, String)> {
        let text = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        let mut rows = vec![
            ("Merchant", text(&self.merchant)),
            ("Date", text(&self.date)),
            (
                "Total",
                self.total
                    .as_ref()
                    .map(|t| t.raw().to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            ("Category", text(&self.category)),
            ("Payment Method", text(&self.payment_method)),
            ("Status", self.status.as_str().to_string()),
            (
                "Duplicate",
                if self.is_duplicate { "Yes" } else { "No" }.to_string(),
            ),
            ("Fraud Flags", self.fraud_flags.join(", ")),
        ];
        if let Some(gst) = &self.gst_number {
            rows.push(("GST Number", gst.clone()));
        }
        if let Some(check) = &self.gst_verification {
            rows.push(("GST Check", check.label()));
        }
        rows
    }
}

/// An {original, duplicate} pair presented for admin adjudication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateContext {
    pub original: Receipt,
    pub duplicate: Receipt,
}

/// A file chosen for submission. Cloning shares the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl SelectedFile {
    /// Read a file from disk; only images and PDFs are accepted
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::validation(format!(
                "File not found: {}",
                path.display()
            )));
        }
        let mime_type = mime_for_path(path)?;
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "receipt".to_string());
        Self::from_bytes(&name, mime_type, bytes)
    }

    pub fn from_bytes(name: &str, mime_type: &str, bytes: Vec<u8>) -> Result<Self> {
        if !is_supported_mime(mime_type) {
            return Err(Error::validation(format!(
                "Unsupported file type '{}' (images and PDF only)",
                mime_type
            )));
        }
        if bytes.is_empty() {
            return Err(Error::validation(format!("File '{}' is empty", name)));
        }
        Ok(Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            bytes: bytes.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn is_supported_mime(mime: &str) -> bool {
    mime.starts_with("image/") || mime == "application/pdf"
}

fn mime_for_path(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        "bmp" => Ok("image/bmp"),
        "tif" | "tiff" => Ok("image/tiff"),
        "heic" => Ok("image/heic"),
        "pdf" => Ok("application/pdf"),
        _ => Err(Error::validation(format!(
            "Unsupported file type: {} (images and PDF only)",
            path.display()
        ))),
    }
}
