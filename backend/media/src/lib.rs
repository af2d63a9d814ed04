//! Frame sources and image plumbing: uploads, camera polling, JPEG encoding
//! and fingerprinting.

pub mod encode;
pub mod mime_detect;
pub mod source;
pub mod upload;

pub use encode::{encode_frame, EncodedFrame, DEFAULT_JPEG_QUALITY};
pub use mime_detect::{detect_mime_type, is_image, is_pdf, sniff_mime_type};
pub use source::{capture_loop, decode_upload, DirectorySource, FrameSource};
pub use upload::{sanitize_file_name, storage_key, LocalUploadStore, StoredUpload, UploadKind};
