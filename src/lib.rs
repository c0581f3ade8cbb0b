/*!
# Data Explorer

A browser-based tool to upload a tabular file, inspect it and draw a line chart
of its columns, built in Rust.

## Overview

The user uploads a CSV or XLSX file. The file is parsed into a [`Table`] and
shown as a preview of its first rows together with per-column summary
statistics. The same table then feeds a configurable line chart: one X column,
any number of Y columns with their own color, dash pattern and optional
natural-log transform, and chart-wide layout options.

## Architecture

### Data Layer
- **loader**: Media type detection, CSV parsing, lazy workbook sheet parsing
- **cache**: Content-addressed cache of parsed uploads, keyed by SHA-256
- **table**: Column-oriented table with numeric and text columns
- **stats**: Data preview and summary statistics

### Chart Layer
- **graph**: Chart options and the renderable figure description
- **plot**: Server-side SVG rendering of a figure with plotters

### Web Layer (`web` feature)
- **app**: axum router, upload handling and JSON endpoints
- **session**: Per-browser session context behind the `session` cookie
- **config**: Command-line and environment configuration

## REST API Endpoints

- `GET /` - The explorer page
- `POST /api/upload` - Multipart upload of a CSV or XLSX file
- `POST /api/sheet` - Selects a workbook sheet
- `GET /api/table` - Current table inspection
- `POST /api/chart` - Visualization state and figure for the chart form
- `POST /api/chart.svg` - The same chart rendered as SVG
- `GET /health` - Liveness probe
*/

pub mod cache;
pub mod error;
pub mod graph;
pub mod loader;
pub mod stats;
pub mod table;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod plot;
#[cfg(feature = "web")]
pub mod session;

pub use cache::{Cached, IngestCache};
pub use error::{ChartError, ChartResult, DataError, DataResult};
pub use graph::{ChartSpec, ChartType, Figure, Visualization, build_figure, visualize};
pub use loader::{Ingested, MediaType, UploadedFile, Workbook};
pub use stats::{ColumnStats, Inspection, describe, head, inspect};
pub use table::{Column, ColumnKind, Table, Value};
