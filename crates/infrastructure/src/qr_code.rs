//! QR code rendering for TOTP enrollment's `otpauth://` URI.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::Luma;
use qrcode::QrCode;

use castellan_core::{AppError, AppResult};

/// Renders an `otpauth://` URI as a PNG QR code, returned as a
/// `data:image/png;base64,...` string ready to embed directly in a
/// response body.
pub fn render_totp_qr_code_png(otpauth_uri: &str) -> AppResult<String> {
    let code = QrCode::new(otpauth_uri.as_bytes())
        .map_err(|error| AppError::Internal(format!("failed to encode QR code: {error}")))?;

    let image = code.render::<Luma<u8>>().min_dimensions(256, 256).build();

    let mut png_bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
        .map_err(|error| AppError::Internal(format!("failed to encode QR code PNG: {error}")))?;

    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png_bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_png_data_uri() {
        let rendered = render_totp_qr_code_png(
            "otpauth://totp/Castellan:user@example.com?secret=ABC&issuer=Castellan",
        )
        .unwrap_or_else(|e| panic!("{e}"));
        assert!(rendered.starts_with("data:image/png;base64,"));
        assert!(rendered.len() > "data:image/png;base64,".len());
    }
}
