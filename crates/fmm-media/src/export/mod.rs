// crates/fmm-media/src/export/mod.rs
//
// §4.8 Export Renderer: `filter_graph` builds the `-filter_complex` plan
// (pure logic, no I/O); `renderer` turns that plan into an actual `ffmpeg`
// invocation and runs it as a worker job.

pub mod filter_graph;
pub mod renderer;
