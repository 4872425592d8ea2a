//! One-shot identification.
//!
//! Every attempt first clears everything the previous one displayed. A match
//! shows id, alias and the backend's confidence as-is. Images are optional:
//! when present they are decoded, described, and optionally written to the
//! configured directory. A broken image only produces a warning next to the
//! images; the match itself stands.

use std::path::{Path, PathBuf};

use fingerprint_portal_sdk::{Backend, ErrorKind, SdkError};
use fingerprint_portal_types::{EncodedImage, IdentificationResult, ImageFormat};
use snafu::{ResultExt, Snafu};

use super::{FlowSettings, IDENTIFY_FALLBACK, IDENTIFY_UNREACHABLE};
use crate::{
    error::{ConsoleError, SaveImageSnafu},
    ticket::{RequestTicket, TicketCounter},
};

/// Why an identification produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum IdentificationFailure {
    /// Nothing enrolled matched the presented fingerprint.
    #[snafu(display("{message}"))]
    NoMatch {
        /// Backend detail or fallback text.
        message: String,
    },

    /// The backend could not drive the sensor.
    #[snafu(display("{message}"))]
    NoHardware {
        /// Backend detail or fallback text.
        message: String,
    },

    /// No usable answer arrived.
    #[snafu(display("{message}"))]
    BackendUnavailable {
        /// Backend detail or fallback text.
        message: String,
    },
}

impl IdentificationFailure {
    fn from_sdk(err: &SdkError) -> Self {
        let fallback =
            if err.has_response() { IDENTIFY_FALLBACK } else { IDENTIFY_UNREACHABLE };
        let message = err.user_message(fallback);
        match err.kind() {
            ErrorKind::NoMatch | ErrorKind::NotFound => Self::NoMatch { message },
            ErrorKind::NoHardware => Self::NoHardware { message },
            ErrorKind::Validation
            | ErrorKind::Conflict
            | ErrorKind::Rejected
            | ErrorKind::Transport => Self::BackendUnavailable { message },
        }
    }

    /// Returns the text shown to the user.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::NoMatch { message }
            | Self::NoHardware { message }
            | Self::BackendUnavailable { message } => message,
        }
    }
}

/// Which side of a match an image shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    /// The capture taken for this attempt.
    Scanned,
    /// The enrolled image it matched.
    Matched,
}

impl ImageRole {
    /// Label used in output and file names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scanned => "scanned",
            Self::Matched => "matched",
        }
    }
}

/// A decoded image attached to a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    /// Scanned or matched.
    pub role: ImageRole,
    /// Format detected from the image bytes.
    pub format: ImageFormat,
    /// Decoded size.
    pub bytes: usize,
    /// Where the image was written, if it was.
    pub saved_to: Option<PathBuf>,
}

/// Everything the identification view displays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentificationView {
    /// The last result, if the last attempt produced one.
    pub result: Option<IdentificationResult>,
    /// Images of `result` that decoded.
    pub images: Vec<ImageSummary>,
    /// Problem with the images; never voids `result`.
    pub image_warning: Option<String>,
    /// Failure of the last attempt.
    pub error: Option<String>,
    /// An attempt is in flight.
    pub pending: bool,
}

/// The identification view.
#[derive(Debug)]
pub struct IdentificationFlow<B> {
    backend: B,
    image_dir: Option<PathBuf>,
    tickets: TicketCounter,
    view: IdentificationView,
}

impl<B> IdentificationFlow<B> {
    /// What is currently displayed.
    #[must_use]
    pub fn view(&self) -> &IdentificationView {
        &self.view
    }
}

impl<B: Backend> IdentificationFlow<B> {
    /// Creates an empty view.
    pub fn new(backend: B, settings: &FlowSettings) -> Self {
        Self {
            backend,
            image_dir: settings.image_dir.clone(),
            tickets: TicketCounter::new(),
            view: IdentificationView::default(),
        }
    }

    /// Clears the display and returns the ticket for a new attempt.
    pub fn begin(&mut self) -> RequestTicket {
        self.view = IdentificationView { pending: true, ..IdentificationView::default() };
        self.tickets.issue()
    }

    /// Applies a finished attempt. Stale attempts are ignored.
    ///
    /// Returns `true` if the outcome was applied.
    pub async fn complete(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<IdentificationResult, SdkError>,
    ) -> bool {
        if !self.tickets.accept(ticket, "identification") {
            return false;
        }
        self.view.pending = false;
        match outcome {
            Ok(result) => {
                if let Some(matched) = &result.matched {
                    tracing::info!(
                        id = %matched.id,
                        alias = %matched.alias,
                        confidence = matched.confidence,
                        "Identification matched"
                    );
                }
                let (images, warning) = self.process_images(&result).await;
                self.view.images = images;
                self.view.image_warning = warning;
                self.view.result = Some(result);
            },
            Err(err) => {
                tracing::debug!(error = %err, "Identification failed");
                self.view.error = Some(IdentificationFailure::from_sdk(&err).message().to_string());
            },
        }
        true
    }

    /// Runs one identification.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentificationFailure`]; its message is also shown in
    /// [`Self::view`].
    pub async fn identify(&mut self) -> Result<IdentificationResult, IdentificationFailure> {
        let ticket = self.begin();
        let outcome = self.backend.identify().await;
        let returned = match &outcome {
            Ok(result) => Ok(result.clone()),
            Err(err) => Err(IdentificationFailure::from_sdk(err)),
        };
        self.complete(ticket, outcome).await;
        returned
    }

    async fn process_images(
        &self,
        result: &IdentificationResult,
    ) -> (Vec<ImageSummary>, Option<String>) {
        let attached = [
            (ImageRole::Scanned, result.scanned_image.as_ref()),
            (ImageRole::Matched, result.matched_image.as_ref()),
        ];
        let mut images = Vec::new();
        let mut problems = Vec::new();
        for (role, image) in attached {
            let Some(image) = image else { continue };
            match self.describe(role, image).await {
                Ok((summary, save_problem)) => {
                    images.push(summary);
                    if let Some(problem) = save_problem {
                        tracing::warn!(role = role.label(), problem = %problem, "Image not saved");
                        problems.push(problem);
                    }
                },
                Err(problem) => {
                    tracing::warn!(role = role.label(), problem = %problem, "Unusable image");
                    problems.push(problem);
                },
            }
        }
        let warning = (!problems.is_empty()).then(|| problems.join("; "));
        (images, warning)
    }

    /// Decodes one image and saves it if a directory is configured.
    ///
    /// A decoded image always yields a summary; a failed save comes back
    /// next to it with `saved_to` left empty.
    async fn describe(
        &self,
        role: ImageRole,
        image: &EncodedImage,
    ) -> Result<(ImageSummary, Option<String>), String> {
        let bytes = image
            .decode()
            .map_err(|e| format!("The {} image could not be decoded: {e}", role.label()))?;
        let format = ImageFormat::sniff(&bytes);
        let mut summary = ImageSummary { role, format, bytes: bytes.len(), saved_to: None };
        let Some(dir) = &self.image_dir else {
            return Ok((summary, None));
        };
        match save_image(dir, role, format, &bytes).await {
            Ok(path) => {
                summary.saved_to = Some(path);
                Ok((summary, None))
            },
            Err(err) => Ok((summary, Some(err.to_string()))),
        }
    }
}

/// Writes an image as `<dir>/<role>.<ext>`, creating `dir` if needed.
///
/// # Errors
///
/// Returns [`ConsoleError::SaveImage`] if the directory or file cannot be
/// written.
pub async fn save_image(
    dir: &Path,
    role: ImageRole,
    format: ImageFormat,
    bytes: &[u8],
) -> Result<PathBuf, ConsoleError> {
    tokio::fs::create_dir_all(dir).await.context(SaveImageSnafu { path: dir.to_path_buf() })?;
    let path = dir.join(format!("{}.{}", role.label(), format.extension()));
    tokio::fs::write(&path, bytes).await.context(SaveImageSnafu { path: path.clone() })?;
    tracing::debug!(path = %path.display(), size = bytes.len(), "Saved identification image");
    Ok(path)
}
