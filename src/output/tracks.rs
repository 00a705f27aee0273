//! BED tracks of merged loci and their constituent calls, plus the per-individual report.

use std::io::{self, Write};

use crate::cnv::call::{CnvCall, CopyType};
use crate::cnv::interval::GenomicInterval;
use crate::utils::number::format_trimmed;

/// Track colours, cycled by merge-group id.
pub const PALETTE: [&str; 7] = [
    "255,0,0",
    "255,127,0",
    "255,255,0",
    "0,255,0",
    "0,0,255",
    "75,0,130",
    "143,0,255",
];

pub fn palette_colour(merge_group: u32) -> &'static str {
    PALETTE[(merge_group % PALETTE.len() as u32) as usize]
}

fn bed_row<W: Write + ?Sized>(out: &mut W, interval: &GenomicInterval, name: &str, colour: &str) -> io::Result<()> {
    writeln!(
        out,
        "{}\t{}\t{}\t{}\t1000\t+\t{}\t{}\t{}",
        interval.chrom, interval.start, interval.end, name, interval.start, interval.end, colour
    )
}

/// The merged and raw tracks of one copy-type pass.
pub struct TrackWriter<'w> {
    merged: &'w mut dyn Write,
    raw: &'w mut dyn Write,
    copy_type: CopyType,
}

impl<'w> TrackWriter<'w> {
    /// Wrap both sinks and write their `track` header lines.
    pub fn new(merged: &'w mut dyn Write, raw: &'w mut dyn Write, copy_type: CopyType, parameter: f64) -> io::Result<Self> {
        let param = format_trimmed(parameter, 6);
        writeln!(
            merged,
            "track name=Merged{}-{} description=\"Merged CNVs INTERVAL\" itemRgb=\"On\"",
            copy_type, param
        )?;
        writeln!(
            raw,
            "track name=Original{}-{} description=\"Unmerged CNVs INTERVAL\" itemRgb=\"On\"",
            copy_type, param
        )?;
        Ok(Self { merged, raw, copy_type })
    }

    pub fn write_merged(&mut self, merge_group: u32, interval: &GenomicInterval) -> io::Result<()> {
        let name = format!("{}_{}", self.copy_type, merge_group);
        bed_row(&mut *self.merged, interval, &name, palette_colour(merge_group))
    }

    pub fn write_raw(&mut self, merge_group: u32, call: &CnvCall) -> io::Result<()> {
        let name = format!("{}_{}-{}", self.copy_type, merge_group, call.sample);
        bed_row(&mut *self.raw, &call.interval, &name, palette_colour(merge_group))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.merged.flush()?;
        self.raw.flush()
    }
}

/// Per-individual report line: the call's record and the locus it was merged into.
pub fn write_report_line<W: Write + ?Sized>(out: &mut W, call: &CnvCall, locus: &GenomicInterval) -> io::Result<()> {
    writeln!(out, "{}\t{}", call.printable(), locus)
}
