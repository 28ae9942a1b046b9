//! Newline-delimited JSON-RPC over stdin/stdout

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::McpServer;
use crate::Result;

/// Serve on the process's stdin/stdout until stdin closes
pub async fn serve_stdio(server: Arc<McpServer>) -> Result<()> {
    serve(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve on any line-oriented reader/writer pair.
///
/// Requests run concurrently; a single writer task serializes replies so
/// lines never interleave.
pub async fn serve<R, W>(server: Arc<McpServer>, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(line) = rx.recv().await {
            if let Err(e) = write_line(&mut writer, &line).await {
                error!(error = %e, "Failed to write response");
                break;
            }
        }
    });

    info!("Serving MCP on stdio");
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let server = Arc::clone(&server);
        let tx = tx.clone();
        tokio::spawn(async move {
            let Some(response) = server.handle_bytes(line.as_bytes(), None).await else {
                return;
            };
            match serde_json::to_string(&response) {
                Ok(json) => {
                    let _ = tx.send(json);
                }
                Err(e) => error!(error = %e, "Failed to serialize response"),
            }
        });
    }

    debug!("stdin closed");
    // In-flight requests hold sender clones; the writer drains until the last
    // one finishes.
    drop(tx);
    if let Err(e) = writer_task.await {
        error!(error = %e, "Writer task failed");
    }
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
