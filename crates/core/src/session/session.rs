use crate::codec::call_result::CallResult;
use crate::codec::json;
use crate::codec::operation_config::{ConfigBuilder, Operation, OperationConfig};
use crate::codec::settings::SessionSettings;
use crate::engine::engine_handle::EngineHandle;
use crate::session::image_input::ImageInputArg;
use crate::session::native_session::NativeSession;
use crate::shared::error::{PrivIdError, Result};

/// Typed face operations on one engine session.
///
/// A negative operation id with an error status is the engine declining
/// the request (no face, spoof, backend refusal) and comes back as `Ok`.
/// `Err` means the call itself could not be completed, or the engine's
/// operation id and status header disagree about whether it failed.
pub struct Session {
    native: NativeSession,
}

impl Session {
    pub fn new(engine: &EngineHandle, settings: &SessionSettings) -> Result<Self> {
        let bytes = json::encode(settings)?;
        Ok(Self {
            native: NativeSession::new(engine, &bytes)?,
        })
    }

    pub fn from_json(engine: &EngineHandle, settings: &str) -> Result<Self> {
        Self::new(engine, &json::decode_settings(settings)?)
    }

    pub fn validate(
        &mut self,
        image: &ImageInputArg,
        config: &OperationConfig,
    ) -> Result<(i32, CallResult)> {
        let bytes = ConfigBuilder::new(Operation::Validate, config).image(image).encode()?;
        let (op, text) = self.native.validate(&bytes, image)?;
        Ok((op, decode(Operation::Validate, op, &text)?))
    }

    pub fn estimate_age(
        &mut self,
        image: &ImageInputArg,
        config: &OperationConfig,
    ) -> Result<(i32, CallResult)> {
        let bytes = ConfigBuilder::new(Operation::EstimateAge, config).image(image).encode()?;
        let (op, text) = self.native.estimate_age(&bytes, image)?;
        Ok((op, decode(Operation::EstimateAge, op, &text)?))
    }

    /// Enroll one face into `config.collection_name`.
    pub fn enroll_onefa(
        &mut self,
        image: &ImageInputArg,
        config: &OperationConfig,
    ) -> Result<(i32, CallResult)> {
        let bytes = ConfigBuilder::new(Operation::EnrollOneFa, config).image(image).encode()?;
        let (op, text) = self.native.enroll_onefa(&bytes, image)?;
        Ok((op, decode(Operation::EnrollOneFa, op, &text)?))
    }

    /// Match one face against `config.collection_name`.
    pub fn face_predict_onefa(
        &mut self,
        image: &ImageInputArg,
        config: &OperationConfig,
    ) -> Result<(i32, CallResult)> {
        let bytes = ConfigBuilder::new(Operation::FacePredictOneFa, config)
            .image(image)
            .encode()?;
        let (op, text) = self.native.face_predict_onefa(&bytes, image)?;
        Ok((op, decode(Operation::FacePredictOneFa, op, &text)?))
    }

    pub fn anti_spoofing(
        &mut self,
        image: &ImageInputArg,
        config: &OperationConfig,
    ) -> Result<(i32, CallResult)> {
        let bytes = ConfigBuilder::new(Operation::AntiSpoofing, config).image(image).encode()?;
        let (op, text) = self.native.anti_spoofing(&bytes, image)?;
        Ok((op, decode(Operation::AntiSpoofing, op, &text)?))
    }

    /// The third element is the ISO crop, shaped by `iso_image.image.info`.
    pub fn face_iso(
        &mut self,
        image: &ImageInputArg,
        config: &OperationConfig,
    ) -> Result<(i32, CallResult, Vec<u8>)> {
        let bytes = ConfigBuilder::new(Operation::FaceIso, config).image(image).encode()?;
        let (op, text, iso) = self.native.face_iso(&bytes, image)?;
        Ok((op, decode(Operation::FaceIso, op, &text)?, iso))
    }

    /// Returns the cropped document then the cropped face after the result.
    pub fn doc_scan_face(
        &mut self,
        image: &ImageInputArg,
        config: &OperationConfig,
    ) -> Result<(i32, CallResult, Vec<u8>, Vec<u8>)> {
        let bytes = ConfigBuilder::new(Operation::DocScanFace, config).image(image).encode()?;
        let (op, text, doc, face) = self.native.doc_scan_face(&bytes, image)?;
        Ok((op, decode(Operation::DocScanFace, op, &text)?, doc, face))
    }

    pub fn face_compare_files(
        &mut self,
        image_a: &ImageInputArg,
        image_b: &ImageInputArg,
        config: &OperationConfig,
    ) -> Result<(i32, CallResult)> {
        let bytes = ConfigBuilder::new(Operation::FaceCompare, config)
            .images(image_a, image_b)?
            .encode()?;
        let (op, text) = self.native.face_compare_files(&bytes, image_a, image_b)?;
        Ok((op, decode(Operation::FaceCompare, op, &text)?))
    }

    pub fn user_delete(&mut self, puid: &str, config: &OperationConfig) -> Result<(i32, CallResult)> {
        let bytes = ConfigBuilder::new(Operation::UserDelete, config).encode()?;
        let (op, text) = self.native.user_delete(&bytes, puid)?;
        Ok((op, decode(Operation::UserDelete, op, &text)?))
    }

    /// Defaults applied by the engine to every later call on this session.
    pub fn set_configuration(&mut self, config: &OperationConfig) -> Result<()> {
        if self.native.set_configuration(&json::encode(config)?)? {
            Ok(())
        } else {
            Err(PrivIdError::Session("engine rejected the session configuration".into()))
        }
    }

    pub fn dispose(&mut self) {
        self.native.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.native.is_disposed()
    }

    /// The JSON-text surface of the same session.
    pub fn native(&mut self) -> &mut NativeSession {
        &mut self.native
    }
}

fn decode(operation: Operation, operation_id: i32, text: &str) -> Result<CallResult> {
    let result = json::decode_result(text)?;
    let status = result.call_status.return_status;
    if (operation_id < 0) != status.is_error() {
        return Err(PrivIdError::MalformedResponse(format!(
            "{operation} returned operation id {operation_id} with status {status}"
        )));
    }
    Ok(result)
}
