use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::json;
use crate::session::image_input::{ImageFormat, ImageInputArg};
use crate::shared::error::{PrivIdError, Result};

/// Per-call engine parameters. Every field is optional and an unset field
/// is left out of the encoded object, so the engine's own default applies.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_image_format: Option<ImageFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighbors: Option<u32>,

    // Face pose and liveness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle_rotation_left_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle_rotation_right_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anti_spoofing_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eyes_blinking_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_profile_enroll: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_profile_predict: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_user_too_close: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_user_too_far: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur_threshold_enroll_pred: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conf_score_thr_enroll: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conf_score_thr_predict: Option<f64>,

    // Documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur_threshold_doc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conf_score_thr_doc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_doc_too_close: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_doc_too_far: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_doc_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_doc_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detect_and_recognize_mrz_code: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculate_age_from_ocr_text: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_auto_rotation: Option<bool>,

    // Toggles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_antispoof: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_enroll_mf: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relax_face_validation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_original_images: Option<bool>,

    /// Engine parameters without a dedicated field.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl OperationConfig {
    pub fn for_collection(name: impl Into<String>) -> Self {
        Self {
            collection_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set a parameter by its wire name. Names that belong to a dedicated
    /// field are ignored; set the field instead.
    pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        if is_named_field(&key) {
            log::warn!("ignoring extra parameter {key}: it has a dedicated field");
        } else {
            self.extra.insert(key, value.into());
        }
        self
    }

    fn drop_shadowed_extras(&mut self) {
        self.extra.retain(|key, _| {
            let named = is_named_field(key);
            if named {
                log::warn!("dropping extra parameter {key}: it has a dedicated field");
            }
            !named
        });
    }
}

const NAMED_FIELDS: &[&str] = &[
    "input_image_format",
    "collection_name",
    "identifier",
    "neighbors",
    "angle_rotation_left_threshold",
    "angle_rotation_right_threshold",
    "anti_spoofing_threshold",
    "eyes_blinking_threshold",
    "threshold_profile_enroll",
    "threshold_profile_predict",
    "threshold_user_too_close",
    "threshold_user_too_far",
    "blur_threshold_enroll_pred",
    "conf_score_thr_enroll",
    "conf_score_thr_predict",
    "blur_threshold_doc",
    "conf_score_thr_doc",
    "threshold_doc_too_close",
    "threshold_doc_too_far",
    "threshold_doc_x",
    "threshold_doc_y",
    "detect_and_recognize_mrz_code",
    "calculate_age_from_ocr_text",
    "document_auto_rotation",
    "skip_antispoof",
    "disable_enroll_mf",
    "relax_face_validation",
    "send_original_images",
];

fn is_named_field(key: &str) -> bool {
    NAMED_FIELDS.contains(&key)
}

/// The engine entry points that take an `OperationConfig`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Validate,
    EstimateAge,
    EnrollOneFa,
    FacePredictOneFa,
    AntiSpoofing,
    FaceIso,
    DocScanFace,
    FaceCompare,
    UserDelete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::EstimateAge => "estimate_age",
            Self::EnrollOneFa => "enroll_onefa",
            Self::FacePredictOneFa => "face_predict_onefa",
            Self::AntiSpoofing => "anti_spoofing",
            Self::FaceIso => "face_iso",
            Self::DocScanFace => "doc_scan_face",
            Self::FaceCompare => "face_compare_files",
            Self::UserDelete => "user_delete",
        }
    }

    pub fn takes_image(self) -> bool {
        !matches!(self, Self::UserDelete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the config actually sent for one call: a copy of the caller's
/// base with the per-operation overlay applied. The base is never mutated.
#[derive(Debug)]
pub struct ConfigBuilder<'a> {
    operation: Operation,
    base: &'a OperationConfig,
    image_format: Option<ImageFormat>,
}

impl<'a> ConfigBuilder<'a> {
    pub fn new(operation: Operation, base: &'a OperationConfig) -> Self {
        Self {
            operation,
            base,
            image_format: None,
        }
    }

    pub fn image(mut self, image: &ImageInputArg) -> Self {
        self.image_format = Some(image.format());
        self
    }

    /// Two-image calls carry a single format parameter, so both images
    /// must share it.
    pub fn images(mut self, a: &ImageInputArg, b: &ImageInputArg) -> Result<Self> {
        if a.format() != b.format() {
            return Err(PrivIdError::InvalidImage(format!(
                "{} needs both images in one format, got {} and {}",
                self.operation,
                a.format(),
                b.format()
            )));
        }
        self.image_format = Some(a.format());
        Ok(self)
    }

    pub fn build(self) -> OperationConfig {
        let mut config = self.base.clone();
        config.drop_shadowed_extras();
        if self.operation.takes_image() {
            if let Some(format) = self.image_format {
                config.input_image_format = Some(format);
            }
        }
        config
    }

    pub fn encode(self) -> Result<Vec<u8>> {
        let operation = self.operation;
        let bytes = json::encode(&self.build())?;
        log::debug!("{operation} config: {} bytes", bytes.len());
        Ok(bytes)
    }
}
