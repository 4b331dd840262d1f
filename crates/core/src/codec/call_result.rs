use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Engine return codes. Anything outside this set fails to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ReturnStatus {
    NoError,
    InvalidSessionHandler,
    InvalidConfiguration,
    InvalidArgument,
    NetworkError,
    GenericError,
    UnhandledException,
    MalformedApiResponse,
    AuthorizationError,
}

impl ReturnStatus {
    pub fn code(self) -> i64 {
        match self {
            Self::NoError => 0,
            Self::InvalidSessionHandler => 2,
            Self::InvalidConfiguration => 4,
            Self::InvalidArgument => 5,
            Self::NetworkError => 6,
            Self::GenericError => 7,
            Self::UnhandledException => 8,
            Self::MalformedApiResponse => 9,
            Self::AuthorizationError => 10,
        }
    }

    pub fn is_error(self) -> bool {
        self != Self::NoError
    }
}

impl TryFrom<i64> for ReturnStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::NoError,
            2 => Self::InvalidSessionHandler,
            4 => Self::InvalidConfiguration,
            5 => Self::InvalidArgument,
            6 => Self::NetworkError,
            7 => Self::GenericError,
            8 => Self::UnhandledException,
            9 => Self::MalformedApiResponse,
            10 => Self::AuthorizationError,
            other => return Err(format!("unknown return status {other}")),
        })
    }
}

impl From<ReturnStatus> for i64 {
    fn from(status: ReturnStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?} ({})", self.code())
    }
}

/// Status block present in every result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallResultHeader {
    pub return_status: ReturnStatus,
    #[serde(default)]
    pub return_message: String,
    #[serde(default)]
    pub operation_id: i64,
    #[serde(default)]
    pub operation_tag: String,
    #[serde(default)]
    pub mf_token: String,
    #[serde(default)]
    pub operation_type_id: i64,
}

/// A decoded engine response.
///
/// Each payload section is `None` when the engine did not send it, which is
/// distinct from a section that is present but empty (`Some(vec![])`).
/// Check `call_status` before reading any section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    pub call_status: CallResultHeader,
    #[serde(
        default,
        deserialize_with = "faces_section",
        skip_serializing_if = "Option::is_none"
    )]
    pub faces: Option<Vec<FaceResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enroll: Option<EnrollData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predict: Option<PredictData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare: Option<CompareResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_delete: Option<UserDeleteResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_image: Option<IsoImageResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentResult>,
}

impl CallResult {
    pub fn is_success(&self) -> bool {
        !self.call_status.return_status.is_error()
    }
}

// The engine sends faces either as a bare list or wrapped in `{"faces": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum FacesWire {
    List(Vec<FaceResult>),
    Wrapped { faces: Vec<FaceResult> },
}

fn faces_section<'de, D>(deserializer: D) -> Result<Option<Vec<FaceResult>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<FacesWire>::deserialize(deserializer)?.map(|wire| match wire {
            FacesWire::List(faces) | FacesWire::Wrapped { faces } => faces,
        }),
    )
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(default)]
    pub top_left: Point,
    #[serde(default)]
    pub bottom_right: Point,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceGeometry {
    #[serde(default)]
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub face_confidence_score: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgeData {
    #[serde(default)]
    pub estimated_age: f64,
    #[serde(default)]
    pub age_confidence_score: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceIds {
    #[serde(default)]
    pub puid: String,
    #[serde(default)]
    pub guid: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub channels: u32,
}

impl ImageInfo {
    /// Byte length of a tightly packed 8-bit image with this shape.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

/// Metadata for an auxiliary image buffer returned next to the result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSection {
    #[serde(default)]
    pub info: ImageInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceResult {
    #[serde(default)]
    pub face_validation_status: i32,
    /// Bit set of face trait flags.
    #[serde(default)]
    pub face_traits_flags: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<FaceGeometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_data: Option<AgeData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<FaceIds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spoof_status: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cropped_image_info: Option<ImageSection>,
}

/// What the identity backend answered for an enroll or predict.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub puid: String,
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrollData {
    #[serde(default)]
    pub enroll_performed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_response: Option<ApiResponse>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictData {
    #[serde(default)]
    pub predict_performed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_response: Option<ApiResponse>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompareResult {
    #[serde(default)]
    pub face_detected_a: bool,
    #[serde(default)]
    pub face_detected_b: bool,
    #[serde(default)]
    pub is_match: bool,
    #[serde(default)]
    pub similarity_score: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub distance_min: f64,
    #[serde(default)]
    pub distance_mean: f64,
    #[serde(default)]
    pub distance_max: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDeleteResponse {
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid_count: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IsoImageResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSection>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrAgeData {
    #[serde(default)]
    pub age: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedDocument {
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_box_center: Option<Point>,
    /// Bit set of document trait flags.
    #[serde(default)]
    pub document_traits: i64,
    #[serde(default)]
    pub mrz_data: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_age_data: Option<OcrAgeData>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_document: Option<DetectedDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cropped_document_image_info: Option<ImageSection>,
}
