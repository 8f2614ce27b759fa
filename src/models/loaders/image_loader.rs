use crate::models::MedicalImage;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 根据扩展名推断 MIME 类型，不支持的扩展名返回 `None`
pub fn media_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let media_type = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        // 原样透传，不做 DICOM 解析
        "dcm" => "application/dicom",
        _ => return None,
    };
    Some(media_type)
}

/// 从单个文件加载影像
pub async fn load_image_file(path: &Path, id: impl Into<String>) -> Result<MedicalImage> {
    let media_type = media_type_for(path)
        .with_context(|| format!("不支持的影像格式: {}", path.display()))?;

    let data = fs::read(path)
        .await
        .with_context(|| format!("无法读取影像文件: {}", path.display()))?;

    let filename = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    Ok(MedicalImage::new(id, filename, media_type, data, Utc::now()))
}

/// 从文件夹中加载所有支持格式的影像
///
/// 按文件名排序，保证同一目录每次得到相同的顺序和相同的 ID（`img-0001` 起）。
/// 单个文件读取失败只记录警告并跳过。
pub async fn load_images_from_folder(folder_path: &str) -> Result<Vec<MedicalImage>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && media_type_for(&path).is_some() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let id = format!("img-{:04}", images.len() + 1);
        match load_image_file(&path, id).await {
            Ok(image) => {
                tracing::debug!("已加载影像: {} ({} 字节)", image.filename, image.size_bytes);
                images.push(image);
            }
            Err(e) => {
                tracing::warn!("加载影像失败 {}: {}", path.display(), e);
            }
        }
    }

    tracing::info!("✓ 从 {} 加载了 {} 张影像", folder_path, images.len());

    Ok(images)
}
