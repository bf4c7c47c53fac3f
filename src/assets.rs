//! Embedded static assets.

/// 1x1 PNG written in place of pages whose source returned 401/403/404.
///
/// Keeping a real decodable image (rather than an empty file) means readers
/// and archive viewers render a blank page instead of erroring out.
pub const PLACEHOLDER_IMAGE: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64,
    0xf8, 0xff, 0xbf, 0x1e, 0x00, 0x05, 0x84, 0x02, 0x7f, 0xc2, 0x5b, 0x1e, 0x2a, 0x00, 0x00,
    0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];
