//! Immutable image graph
//!
//! Nodes describe an image lazily: nothing is read until a
//! [`RenderContext`](super::RenderContext) rasterizes a region. Cropping
//! keeps coordinates where they were, so a crop at `(x, y)` must be followed
//! by a translation of `(-x, -y)` to bring its origin back to `(0, 0)`.

use std::fmt;
use std::sync::Arc;

use crate::buffer::PixelBuffer;
use crate::types::{PixelFormat, Rect};

/// Shared handle to a graph node
#[derive(Clone)]
pub struct ImageNode {
    kind: Arc<NodeKind>,
}

enum NodeKind {
    Source(PixelBuffer),
    Crop { input: ImageNode, rect: Rect },
    Translate { input: ImageNode, dx: i64, dy: i64 },
}

/// Where the pixels of a node come from: graph position `(gx, gy)` shows
/// source pixel `(gx - offset_x, gy - offset_y)` when it lies inside `clip`
pub(crate) struct Placement<'a> {
    pub buffer: &'a PixelBuffer,
    pub offset_x: i64,
    pub offset_y: i64,
    pub clip: Rect,
}

impl ImageNode {
    /// Leaf node reading from `buffer`. The buffer is retained, not copied.
    pub fn source(buffer: PixelBuffer) -> Self {
        Self::from_kind(NodeKind::Source(buffer))
    }

    /// Restrict to the part of this image inside `rect`
    pub fn cropped(&self, rect: Rect) -> Self {
        Self::from_kind(NodeKind::Crop {
            input: self.clone(),
            rect,
        })
    }

    /// Move this image by `(dx, dy)`
    pub fn translated(&self, dx: i64, dy: i64) -> Self {
        Self::from_kind(NodeKind::Translate {
            input: self.clone(),
            dx,
            dy,
        })
    }

    fn from_kind(kind: NodeKind) -> Self {
        Self {
            kind: Arc::new(kind),
        }
    }

    /// Region of graph space this node covers
    pub fn extent(&self) -> Rect {
        self.placement().clip
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.placement().buffer.pixel_format()
    }

    pub(crate) fn placement(&self) -> Placement<'_> {
        match &*self.kind {
            NodeKind::Source(buffer) => Placement {
                buffer,
                offset_x: 0,
                offset_y: 0,
                clip: Rect::new(0, 0, buffer.width() as i64, buffer.height() as i64),
            },
            NodeKind::Crop { input, rect } => {
                let placement = input.placement();
                Placement {
                    clip: placement.clip.intersect(rect),
                    ..placement
                }
            }
            NodeKind::Translate { input, dx, dy } => {
                let placement = input.placement();
                Placement {
                    offset_x: placement.offset_x + dx,
                    offset_y: placement.offset_y + dy,
                    clip: placement.clip.translate(*dx, *dy),
                    ..placement
                }
            }
        }
    }
}

impl fmt::Debug for ImageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.kind {
            NodeKind::Source(buffer) => f.debug_tuple("Source").field(&buffer.size()).finish(),
            NodeKind::Crop { input, rect } => f
                .debug_struct("Crop")
                .field("rect", rect)
                .field("input", input)
                .finish(),
            NodeKind::Translate { input, dx, dy } => f
                .debug_struct("Translate")
                .field("dx", dx)
                .field("dy", dy)
                .field("input", input)
                .finish(),
        }
    }
}
