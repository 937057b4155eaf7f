//! Secure: password-protect a document.

use super::{artifact, TransformOutput};
use crate::document::PdfDocument;
use crate::error::NodeError;
use crate::graph::SecureConfig;
use crate::store::FileArtifact;
use tracing::info;

pub(crate) fn secure(
    cfg: &SecureConfig,
    file: &FileArtifact,
) -> Result<TransformOutput, NodeError> {
    let user = cfg.user_password.as_deref().filter(|p| !p.is_empty());
    let owner = cfg.owner_password.as_deref().filter(|p| !p.is_empty());
    if user.is_none() && owner.is_none() {
        return Err(NodeError::InvalidConfig(
            "a user or owner password is required".into(),
        ));
    }
    let user = user.unwrap_or("");
    // Without an owner password the user password unlocks everything.
    let owner = owner.unwrap_or(user);

    let mut doc = PdfDocument::load(&file.data)?;
    doc.encrypt(user, owner, &cfg.permissions)?;
    info!("Protected '{}' (user password: {})", file.name, !user.is_empty());
    Ok(TransformOutput::single(artifact("secure", format!("protected-{}", file.name), doc.save()?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::testutil::{open_encrypted, sample_pdf};
    use crate::document::{Permissions, Printing};
    use crate::transform::testutil::file;

    #[test]
    fn needs_a_password() {
        let f = file("doc.pdf", sample_pdf(1));
        let cfg = SecureConfig {
            user_password: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(secure(&cfg, &f), Err(NodeError::InvalidConfig(_))));
    }

    #[test]
    fn output_is_encrypted_and_renamed() {
        let f = file("doc.pdf", sample_pdf(2));
        let cfg = SecureConfig {
            user_password: Some("open".into()),
            ..Default::default()
        };
        let out = secure(&cfg, &f).unwrap();
        assert_eq!(out.files[0].name, "protected-doc.pdf");
        let bytes = &out.files[0].data;
        assert!(bytes.windows(8).any(|w| w == b"/Encrypt"));
    }

    #[test]
    fn owner_only_is_accepted() {
        let f = file("doc.pdf", sample_pdf(1));
        let cfg = SecureConfig {
            owner_password: Some("admin".into()),
            ..Default::default()
        };
        assert!(secure(&cfg, &f).is_ok());
    }

    #[test]
    fn user_password_opens_the_output_with_configured_permissions() {
        let f = file("doc.pdf", sample_pdf(2));
        let cfg = SecureConfig {
            user_password: Some("open".into()),
            owner_password: None,
            permissions: Permissions {
                printing: Printing::LowResolution,
                document_assembly: false,
                ..Default::default()
            },
        };
        let out = secure(&cfg, &f).unwrap();
        let (p, decrypted) = open_encrypted(&out.files[0].data, "open");
        assert_eq!(lopdf::Permissions::from_bits_truncate(p as _), cfg.permissions.flags());
        let text = decrypted.extract_text(&[1]).unwrap();
        assert!(text.contains("Page 1"), "got: {text}");
    }
}
