use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 单张医学影像
///
/// 创建后不可变，批次之间克隆时只复制 `Arc`，不复制二进制内容。
/// 只支持序列化：导出时不含二进制内容，无法据此还原影像。
#[derive(Clone, Serialize)]
pub struct MedicalImage {
    pub id: String,
    pub filename: String,
    pub size_bytes: u64,
    /// MIME 类型，例如 `image/png`
    pub media_type: String,
    #[serde(skip)]
    data: Arc<[u8]>,
    pub uploaded_at: DateTime<Utc>,
}

impl MedicalImage {
    /// 创建新的影像，`size_bytes` 取自数据长度
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        media_type: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        let data = data.into();
        Self {
            id: id.into(),
            filename: filename.into(),
            size_bytes: data.len() as u64,
            media_type: media_type.into(),
            data,
            uploaded_at,
        }
    }

    /// 二进制内容
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for MedicalImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MedicalImage")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("size_bytes", &self.size_bytes)
            .field("media_type", &self.media_type)
            .field("uploaded_at", &self.uploaded_at)
            .finish_non_exhaustive()
    }
}

impl PartialEq for MedicalImage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.filename == other.filename
            && self.media_type == other.media_type
            && self.data == other.data
    }
}

impl Eq for MedicalImage {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_comes_from_payload() {
        let image = MedicalImage::new("img-1", "a.png", "image/png", vec![1u8, 2, 3], Utc::now());
        assert_eq!(image.size_bytes, 3);
        assert_eq!(image.data(), &[1, 2, 3]);
    }

    #[test]
    fn test_serialized_form_omits_payload() {
        let image = MedicalImage::new("img-1", "a.png", "image/png", vec![7u8; 16], Utc::now());
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["size_bytes"], 16);
        assert_eq!(json["media_type"], "image/png");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_clone_shares_payload() {
        let image = MedicalImage::new("img-1", "a.png", "image/png", vec![0u8; 1024], Utc::now());
        let copy = image.clone();
        assert!(std::ptr::eq(image.data().as_ptr(), copy.data().as_ptr()));
    }
}
