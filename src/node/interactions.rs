//! Hit testing and title editing scoped to a node's bounding box.

use crate::constants::*;
use eframe::egui::{Pos2, Rect, Vec2};

/// Part of a node under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitRegion {
    /// Title bar
    Title,
    /// Input slot by index
    Input(usize),
    /// Output slot by index
    Output(usize),
    /// Bottom-right resize handle
    ResizeHandle,
    /// Anywhere else inside the node
    Body,
}

/// Size of the resize handle square in world units.
const RESIZE_HANDLE: f32 = 10.0;

/// World-space centre of input slot `index` for a node at `rect`.
pub fn input_slot_pos(rect: Rect, index: usize) -> Pos2 {
    Pos2::new(
        rect.left(),
        rect.top() + TITLE_HEIGHT + SLOT_SPACING * index as f32 + SLOT_SPACING / 2.0,
    )
}

/// World-space centre of output slot `index` for a node at `rect`.
pub fn output_slot_pos(rect: Rect, index: usize) -> Pos2 {
    Pos2::new(
        rect.right(),
        rect.top() + TITLE_HEIGHT + SLOT_SPACING * index as f32 + SLOT_SPACING / 2.0,
    )
}

/// Finds which part of a node (world rect) contains `point`.
///
/// Slots are tested first with a tolerance so that their half outside the body
/// still registers.
pub fn hit_test(rect: Rect, inputs: usize, outputs: usize, point: Pos2) -> Option<HitRegion> {
    let tolerance = SLOT_RADIUS * 2.0;
    for i in 0..inputs {
        if input_slot_pos(rect, i).distance(point) <= tolerance {
            return Some(HitRegion::Input(i));
        }
    }
    for i in 0..outputs {
        if output_slot_pos(rect, i).distance(point) <= tolerance {
            return Some(HitRegion::Output(i));
        }
    }
    if !rect.contains(point) {
        return None;
    }
    if point.y <= rect.top() + TITLE_HEIGHT {
        return Some(HitRegion::Title);
    }
    let handle = Rect::from_min_size(
        rect.right_bottom() - Vec2::splat(RESIZE_HANDLE),
        Vec2::splat(RESIZE_HANDLE),
    );
    if handle.contains(point) {
        return Some(HitRegion::ResizeHandle);
    }
    Some(HitRegion::Body)
}

/// Whether `point` is within `margin` of the node rect.
pub fn is_near_node(rect: Rect, point: Pos2, margin: f32) -> bool {
    rect.expand(margin).contains(point)
}

/// Gesture state owned by a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interactions {
    /// Title text being edited, if a title edit is in progress
    pub editing_title: Option<String>,
}

impl Interactions {
    /// Handles a double click. Starts title editing when the title bar was hit.
    pub fn on_double_click(&mut self, region: HitRegion, current_title: &str) -> bool {
        if region == HitRegion::Title {
            self.editing_title = Some(current_title.to_string());
            true
        } else {
            false
        }
    }

    /// Whether a title edit is active.
    pub fn is_editing_title(&self) -> bool {
        self.editing_title.is_some()
    }

    /// Ends the title edit, returning the new title when it is non-empty.
    pub fn commit_title(&mut self) -> Option<String> {
        self.editing_title
            .take()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Abandons the title edit.
    pub fn cancel_title(&mut self) {
        self.editing_title = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::{pos2, vec2};

    fn rect() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), vec2(200.0, 100.0))
    }

    #[test]
    fn regions_are_detected() {
        let r = rect();
        assert_eq!(hit_test(r, 0, 0, pos2(50.0, 10.0)), Some(HitRegion::Title));
        assert_eq!(hit_test(r, 0, 0, pos2(50.0, 60.0)), Some(HitRegion::Body));
        assert_eq!(hit_test(r, 0, 0, pos2(195.0, 95.0)), Some(HitRegion::ResizeHandle));
        assert_eq!(hit_test(r, 0, 0, pos2(250.0, 60.0)), None);
    }

    #[test]
    fn slots_take_priority_and_extend_outside() {
        let r = rect();
        let slot = input_slot_pos(r, 1);
        assert_eq!(hit_test(r, 2, 0, slot - vec2(4.0, 0.0)), Some(HitRegion::Input(1)));
        let out = output_slot_pos(r, 0);
        assert_eq!(hit_test(r, 0, 1, out + vec2(3.0, 0.0)), Some(HitRegion::Output(0)));
    }

    #[test]
    fn near_node_margin() {
        assert!(is_near_node(rect(), pos2(230.0, 50.0), 40.0));
        assert!(!is_near_node(rect(), pos2(260.0, 50.0), 40.0));
    }

    #[test]
    fn title_editing_flow() {
        let mut interactions = Interactions::default();
        assert!(!interactions.on_double_click(HitRegion::Body, "A"));
        assert!(interactions.on_double_click(HitRegion::Title, "A"));
        interactions.editing_title = Some("  Renamed ".into());
        assert_eq!(interactions.commit_title(), Some("Renamed".into()));
        assert!(!interactions.is_editing_title());

        interactions.on_double_click(HitRegion::Title, "A");
        interactions.editing_title = Some("   ".into());
        assert_eq!(interactions.commit_title(), None);
    }
}
