//! Harness commands.

use std::path::Path;

use layerio_core::{LineOptions, METRICS, Separator, StreamConfig};

use crate::error::HarnessError;
use crate::report::{BomReport, CopyReport, LineRecord, LinesReport};

/// Options for [`lines`].
#[derive(Debug, Clone, Default)]
pub struct LinesRequest {
    pub separator: Option<String>,
    pub paragraph: bool,
    pub whole: bool,
    pub limit: Option<usize>,
    pub chomp: bool,
    /// `"[BOM|]external[:internal]"`.
    pub encoding: Option<String>,
}

impl LinesRequest {
    fn line_options(&self) -> Result<LineOptions, HarnessError> {
        let modes = [self.separator.is_some(), self.paragraph, self.whole];
        if modes.iter().filter(|&&m| m).count() > 1 {
            return Err(HarnessError::ConflictingOptions(
                "--separator, --paragraph and --whole are exclusive",
            ));
        }
        let mut opts = LineOptions::new().chomp(self.chomp);
        if let Some(sep) = &self.separator {
            opts = opts.separator(Separator::bytes(sep.as_bytes()));
        } else if self.paragraph {
            opts = opts.paragraph();
        } else if self.whole {
            opts = opts.whole();
        }
        if let Some(limit) = self.limit {
            opts = opts.limit(limit);
        }
        Ok(opts)
    }
}

/// Splits `path` into lines.
pub fn lines(path: &Path, req: &LinesRequest) -> Result<LinesReport, HarnessError> {
    let opts = req.line_options()?;
    let mut stream = layerio_sys::open(path, "r", StreamConfig::from_env())?;
    if let Some(spec) = &req.encoding {
        stream.set_encoding_spec(spec)?;
    }
    let mut records = Vec::new();
    while let Some(line) = stream.gets(&opts)? {
        records.push(LineRecord {
            lineno: stream.lineno(),
            text: String::from_utf8_lossy(&line).into_owned(),
            bytes: line.len(),
        });
        if opts.limit == Some(0) {
            break;
        }
    }
    let report = LinesReport {
        path: path.display().to_string(),
        external_encoding: stream.external_encoding()?.name().to_owned(),
        internal_encoding: stream.internal_encoding()?.map(|e| e.name().to_owned()),
        lines: records,
    };
    stream.close()?;
    Ok(report)
}

/// Reports the encoding named by a byte-order mark at the start of `path`.
pub fn bom(path: &Path) -> Result<BomReport, HarnessError> {
    let mut stream = layerio_sys::open(path, "rb", StreamConfig::default())?;
    let encoding = stream.set_encoding_by_bom()?;
    stream.close()?;
    Ok(BomReport {
        path: path.display().to_string(),
        encoding: encoding.map(|e| e.name().to_owned()),
    })
}

/// Copies `src` to `dst` through buffered streams.
pub fn copy(
    src: &Path,
    dst: &Path,
    buffer_size: usize,
    sync: bool,
) -> Result<CopyReport, HarnessError> {
    let config = StreamConfig::binary()
        .with_buffer_size(buffer_size)
        .with_sync(sync);
    let before = METRICS.snapshot();
    let mut input = layerio_sys::open(src, "rb", config.clone())?;
    let mut output = layerio_sys::open(dst, "wb", config)?;
    let mut total = 0u64;
    while let Some(chunk) = input.read(Some(buffer_size.max(1)))? {
        output.write(&chunk)?;
        total += chunk.len() as u64;
    }
    input.close()?;
    output.close()?;
    Ok(CopyReport {
        source: src.display().to_string(),
        destination: dst.display().to_string(),
        bytes: total,
        metrics: METRICS.snapshot().since(&before),
    })
}
