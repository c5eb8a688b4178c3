//! Core library for Flame Canvas.
//!
//! The crate renders large interval trees (flame graphs, waterfalls, time
//! series) onto one canvas at interactive frame rates. Each module owns a
//! distinct subsystem: clustering of the tree into drawable groups, render
//! surfaces with batched draw queues, vertical layout of stacked panels, the
//! frame scheduler and the pointer/hit-region engine. Hosts plug their own 2D
//! context in through [`Canvas`] and their event loop through
//! [`FrameScheduler`].

pub mod canvas;
pub mod chart;
pub mod clusters;
pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod interactions;
pub mod layout;
pub mod plugin;
pub mod scheduler;
pub mod surface;
pub mod time_grid;

pub use canvas::{Canvas, DrawCommand, FillStyle, RecordingCanvas, TextMetrics};
pub use chart::FlameCanvas;
pub use clusters::{
    clusterize_flat_tree, flat_tree, flat_tree_min_max, meta_clusterize_flat_tree,
    reclusterize_clustered_flat_tree, validate_tree, ClusterOptions, ClusterizedNode,
    FlatTreeNode, MetaCluster, MinMax, SourceNode,
};
pub use config::{ChartSettings, ChartStyles, RenderOptions, RenderStyles, TimeGridStyles};
pub use engine::{ChartEvent, RenderEngine, HIT_REGION_REBUILD_DELAY};
pub use error::{FlameCanvasError, Result};
pub use ids::{IdAllocator, PanelId};
pub use interactions::{
    Envelope, EventTarget, HitData, HitRegion, InteractionEvent, InteractionsEngine,
    PointerEvent, SeparatedInteractions,
};
pub use layout::{PanelHeight, Placement, PlacementType};
pub use plugin::{OverlayContext, PanelContext, Plugin};
pub use scheduler::{FrameHandle, FrameScheduler, ManualScheduler, TimerHandle};
pub use surface::{PanelRequest, PanelSurface, RenderSurface, Surface, TooltipField};
pub use time_grid::TimeGrid;
