// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File transfer helpers for Telegram documents.

use chatlet_core::{ChatletError, OutboundDocument};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{Document, FileMeta, InputFile};

/// Download a file from Telegram servers into memory.
pub async fn download_file(bot: &Bot, file_meta: &FileMeta) -> Result<Vec<u8>, ChatletError> {
    let file = bot
        .get_file(file_meta.id.clone())
        .await
        .map_err(|e| ChatletError::Channel {
            message: format!("failed to get file info: {e}"),
            source: Some(Box::new(e)),
        })?;

    let mut buf = Vec::with_capacity(file.size as usize);
    bot.download_file(&file.path, &mut buf)
        .await
        .map_err(|e| ChatletError::Channel {
            message: format!("failed to download file: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(buf)
}

/// Download a document together with the name it was uploaded under.
pub async fn download_document(
    bot: &Bot,
    doc: &Document,
) -> Result<(String, Vec<u8>), ChatletError> {
    let bytes = download_file(bot, &doc.file).await?;
    let filename = doc.file_name.clone().unwrap_or_default();
    Ok((filename, bytes))
}

/// Turn an outbound document into an in-memory upload.
pub fn input_file(doc: &OutboundDocument) -> InputFile {
    InputFile::memory(doc.bytes.clone()).file_name(doc.filename.clone())
}
