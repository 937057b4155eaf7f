//! Standard security handler: password protection and permission flags.

use super::PdfDocument;
use crate::error::BoardError;
use lopdf::{
    EncryptionState, EncryptionVersion, Object, Permissions as PdfPermissions, StringFormat,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Printing permission level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Printing {
    #[default]
    HighResolution,
    LowResolution,
    None,
}

/// What a user opening the document with the *user* password may do.
///
/// Defaults allow everything, including full-resolution printing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Permissions {
    pub printing: Printing,
    pub modifying: bool,
    pub copying: bool,
    pub annotating: bool,
    pub filling_forms: bool,
    pub content_accessibility: bool,
    pub document_assembly: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            printing: Printing::HighResolution,
            modifying: true,
            copying: true,
            annotating: true,
            filling_forms: true,
            content_accessibility: true,
            document_assembly: true,
        }
    }
}

impl Permissions {
    pub(crate) fn flags(&self) -> PdfPermissions {
        let mut flags = PdfPermissions::empty();
        match self.printing {
            Printing::HighResolution => {
                flags |= PdfPermissions::PRINTABLE | PdfPermissions::PRINTABLE_IN_HIGH_QUALITY
            }
            Printing::LowResolution => flags |= PdfPermissions::PRINTABLE,
            Printing::None => {}
        }
        for (allowed, flag) in [
            (self.modifying, PdfPermissions::MODIFIABLE),
            (self.copying, PdfPermissions::COPYABLE),
            (self.annotating, PdfPermissions::ANNOTABLE),
            (self.filling_forms, PdfPermissions::FILLABLE),
            (self.content_accessibility, PdfPermissions::COPYABLE_FOR_ACCESSIBILITY),
            (self.document_assembly, PdfPermissions::ASSEMBLABLE),
        ] {
            if allowed {
                flags |= flag;
            }
        }
        flags
    }
}

impl PdfDocument {
    /// Encrypt with 128-bit RC4 (security handler revision 3).
    ///
    /// Takes effect on [`PdfDocument::save`].
    pub fn encrypt(
        &mut self,
        user_password: &str,
        owner_password: &str,
        permissions: &Permissions,
    ) -> Result<(), BoardError> {
        if self.is_encrypted() {
            return Err(BoardError::InvalidConfig("document is already encrypted".into()));
        }
        // Key derivation mixes in the first file identifier.
        if !self.doc.trailer.has(b"ID") {
            let id = uuid::Uuid::new_v4().as_bytes().to_vec();
            self.doc.trailer.set(
                "ID",
                Object::Array(vec![
                    Object::String(id.clone(), StringFormat::Hexadecimal),
                    Object::String(id, StringFormat::Hexadecimal),
                ]),
            );
        }

        let version = EncryptionVersion::V2 {
            document: &self.doc,
            owner_password,
            user_password,
            key_length: 128,
            permissions: permissions.flags(),
        };
        let state = EncryptionState::try_from(version)
            .map_err(|e| BoardError::Internal(format!("encryption setup failed: {}", e)))?;
        self.doc
            .encrypt(&state)
            .map_err(|e| BoardError::Internal(format!("encryption failed: {}", e)))?;
        debug!("Encrypted document (permissions: {:?})", permissions);
        Ok(())
    }

    pub fn is_encrypted(&self) -> bool {
        self.doc.trailer.has(b"Encrypt")
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;

    #[test]
    fn default_permissions_allow_everything() {
        assert_eq!(Permissions::default().flags(), PdfPermissions::all());
    }

    #[test]
    fn low_resolution_printing_drops_high_quality_bit() {
        let p = Permissions {
            printing: Printing::LowResolution,
            ..Default::default()
        };
        let flags = p.flags();
        assert!(flags.contains(PdfPermissions::PRINTABLE));
        assert!(!flags.contains(PdfPermissions::PRINTABLE_IN_HIGH_QUALITY));
    }

    #[test]
    fn encrypted_output_carries_encrypt_dictionary() {
        let mut doc = PdfDocument::load(&sample_pdf(1)).unwrap();
        doc.encrypt("user", "owner", &Permissions::default()).unwrap();
        assert!(doc.is_encrypted());
        let bytes = doc.save().unwrap();
        assert!(bytes.windows(8).any(|w| w == b"/Encrypt"));
    }

    #[test]
    fn user_password_decrypts_the_pages() {
        let mut doc = PdfDocument::load(&sample_pdf(2)).unwrap();
        doc.encrypt("open", "owner", &Permissions::default()).unwrap();
        let (_, decrypted) = open_encrypted(&doc.save().unwrap(), "open");
        assert_eq!(decrypted.get_pages().len(), 2);
        let text = decrypted.extract_text(&[2]).unwrap();
        assert!(text.contains("Page 2"), "got: {text}");
    }

    #[test]
    fn permission_flags_land_in_the_encrypt_dictionary() {
        let restricted = Permissions {
            printing: Printing::None,
            modifying: false,
            copying: false,
            ..Default::default()
        };
        for perms in [Permissions::default(), restricted] {
            let mut doc = PdfDocument::load(&sample_pdf(1)).unwrap();
            doc.encrypt("user", "owner", &perms).unwrap();
            let (p, _) = open_encrypted(&doc.save().unwrap(), "user");
            assert_eq!(PdfPermissions::from_bits_truncate(p as _), perms.flags(), "P = {p}");
        }
    }
}
