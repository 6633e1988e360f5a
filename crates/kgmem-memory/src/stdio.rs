//! Line-delimited JSON driver for the facade.
//!
//! Each input line is one call, `{"id": .., "tool": "..", "arguments": {..}}`.
//! Each call produces exactly one output line carrying the same `id` and
//! either a `result` or an `error` with `kind` and `message`.

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use kgmem_graph::GraphStore;

use crate::error::MemoryError;
use crate::facade::KnowledgeGraphMemory;

#[derive(Deserialize)]
struct Call {
    #[serde(default)]
    id: Value,
    tool: String,
    #[serde(default)]
    arguments: Value,
}

fn error_response(id: Value, err: &MemoryError) -> Value {
    json!({
        "id": id,
        "error": { "kind": err.kind(), "message": err.to_string() },
    })
}

/// Handle one input line and build its response.
pub async fn handle_line<S: GraphStore + Clone>(
    memory: &KnowledgeGraphMemory<S>,
    line: &str,
) -> Value {
    let call: Call = match serde_json::from_str(line) {
        Ok(call) => call,
        Err(e) => {
            let err = MemoryError::Validation(format!("malformed call: {e}"));
            return error_response(Value::Null, &err);
        }
    };

    match memory.dispatch(&call.tool, call.arguments).await {
        Ok(result) => json!({ "id": call.id, "result": result }),
        Err(err) => error_response(call.id, &err),
    }
}

/// Serve calls from `reader` until EOF, writing responses to `writer`.
pub async fn serve<S, R, W>(
    memory: &KnowledgeGraphMemory<S>,
    reader: R,
    mut writer: W,
) -> std::io::Result<u64>
where
    S: GraphStore + Clone,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut handled = 0;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(memory, &line).await;
        let mut out = response.to_string();
        out.push('\n');
        writer.write_all(out.as_bytes()).await?;
        writer.flush().await?;
        handled += 1;
    }
    Ok(handled)
}
