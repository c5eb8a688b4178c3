//! Vertical stacking of panels inside the main canvas.

use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

/// Height a plugin asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelHeight {
    Fixed(f64),
    /// Take a share of whatever space the fixed panels leave.
    Flexible,
}

impl Serialize for PanelHeight {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Fixed(height) => serializer.serialize_f64(*height),
            Self::Flexible => serializer.serialize_str("flexible"),
        }
    }
}

impl<'de> Deserialize<'de> for PanelHeight {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Fixed(f64),
            Named(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Fixed(height) => Ok(Self::Fixed(height)),
            Raw::Named(name) if name == "flexible" => Ok(Self::Flexible),
            Raw::Named(name) => Err(D::Error::custom(format!(
                "expected a number or `flexible`, got `{name}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlacementType {
    /// Caller-mandated height; layout never changes it.
    Static,
    /// Grows to absorb leftover space.
    FlexibleGrowing,
    /// A fixed-height panel the user may resize.
    FlexibleStatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub width: f64,
    pub position: f64,
    pub height: f64,
    pub placement_type: PlacementType,
    pub collapsed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildrenLayout {
    pub placements: Vec<Placement>,
    /// `total_height - sum(heights)`; negative when static panels overflow.
    pub free_space: f64,
}

/// Height and flexibility a panel reports before layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutInput {
    pub placement_type: PlacementType,
    pub height: f64,
    pub collapsed: bool,
}

/// Something that takes part in vertical stacking.
pub trait Layoutable {
    fn layout_input(&self, preferred: PanelHeight) -> LayoutInput;
    fn apply_placement(&mut self, placement: &Placement);
}

/// Stacks the panels at their reported heights, top to bottom.
pub fn get_children_layout(width: f64, total_height: f64, inputs: &[LayoutInput]) -> ChildrenLayout {
    let mut position = 0.0;
    let mut free_space = total_height;
    let placements = inputs
        .iter()
        .map(|input| {
            let height = if input.collapsed { 0.0 } else { input.height };
            let placement = Placement {
                width,
                position,
                height,
                placement_type: input.placement_type,
                collapsed: input.collapsed,
            };
            position += height;
            free_space -= height;
            placement
        })
        .collect();

    ChildrenLayout {
        placements,
        free_space,
    }
}

fn restack(placements: &mut [Placement]) {
    let mut position = 0.0;
    for placement in placements {
        placement.position = position;
        position += placement.height;
    }
}

/// Shares positive free space among the growing panels.
///
/// Zero-height growing panels get an even floor share each, the last of them
/// also taking the rounding remainder. When every growing panel already has a
/// height, the last one takes the whole free space. Without growing panels the
/// free space is left as is.
pub fn expand_growing_children_layout(mut layout: ChildrenLayout) -> ChildrenLayout {
    if layout.free_space <= 0.0 {
        return layout;
    }

    let is_growing =
        |placement: &Placement| placement.placement_type == PlacementType::FlexibleGrowing && !placement.collapsed;

    let mut targets: Vec<usize> = layout
        .placements
        .iter()
        .enumerate()
        .filter(|(_, placement)| is_growing(placement) && placement.height == 0.0)
        .map(|(index, _)| index)
        .collect();
    if targets.is_empty() {
        targets.extend(layout.placements.iter().rposition(is_growing));
    }
    let Some(&last_target) = targets.last() else {
        return layout;
    };

    let part = (layout.free_space / targets.len() as f64).floor().max(0.0);
    let remainder = layout.free_space - part * targets.len() as f64;
    for &index in &targets {
        let share = if index == last_target { part + remainder } else { part };
        layout.placements[index].height += share;
    }

    restack(&mut layout.placements);
    layout.free_space = 0.0;
    layout
}

/// Removes a space deficit from the last non-static panels, bottom up.
///
/// Static panels are never shrunk; if they alone overflow, the remaining
/// deficit stays in `free_space`.
pub fn truncate_children_layout(mut layout: ChildrenLayout) -> ChildrenLayout {
    let mut deficit = -layout.free_space;

    while deficit > 0.0 {
        let Some(index) = layout.placements.iter().rposition(|placement| {
            placement.height > 0.0 && placement.placement_type != PlacementType::Static
        }) else {
            break;
        };

        let placement = &mut layout.placements[index];
        let new_height = (placement.height - deficit).max(0.0);
        let delta = placement.height - new_height;
        placement.height = new_height;
        deficit -= delta;
        layout.free_space += delta;
    }

    restack(&mut layout.placements);
    layout
}

/// Full layout pass: stack, then grow or truncate to fit `total_height`.
pub fn calc_children_layout(width: f64, total_height: f64, inputs: &[LayoutInput]) -> ChildrenLayout {
    let layout = get_children_layout(width, total_height, inputs);

    if layout.free_space > 0.0 {
        expand_growing_children_layout(layout)
    } else if layout.free_space < 0.0 {
        truncate_children_layout(layout)
    } else {
        layout
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn input(placement_type: PlacementType, height: f64) -> LayoutInput {
        LayoutInput {
            placement_type,
            height,
            collapsed: false,
        }
    }

    fn heights(layout: &ChildrenLayout) -> Vec<f64> {
        layout.placements.iter().map(|placement| placement.height).collect()
    }

    fn positions(layout: &ChildrenLayout) -> Vec<f64> {
        layout.placements.iter().map(|placement| placement.position).collect()
    }

    #[test]
    fn growing_panel_fills_the_gap() {
        let layout = calc_children_layout(
            200.0,
            100.0,
            &[
                input(PlacementType::Static, 40.0),
                input(PlacementType::FlexibleGrowing, 0.0),
                input(PlacementType::Static, 30.0),
            ],
        );

        assert_eq!(heights(&layout), vec![40.0, 30.0, 30.0]);
        assert_eq!(positions(&layout), vec![0.0, 40.0, 70.0]);
        assert_eq!(layout.free_space, 0.0);
    }

    #[test]
    fn remainder_goes_to_the_last_growing_panel() {
        let layout = calc_children_layout(
            200.0,
            100.0,
            &[
                input(PlacementType::FlexibleGrowing, 0.0),
                input(PlacementType::Static, 1.0),
                input(PlacementType::FlexibleGrowing, 0.0),
                input(PlacementType::FlexibleGrowing, 0.0),
            ],
        );

        assert_eq!(heights(&layout), vec![33.0, 1.0, 33.0, 33.0]);

        let layout = calc_children_layout(
            200.0,
            101.0,
            &[
                input(PlacementType::FlexibleGrowing, 0.0),
                input(PlacementType::FlexibleGrowing, 0.0),
            ],
        );
        assert_eq!(heights(&layout), vec![50.0, 51.0]);
    }

    #[test]
    fn collapsed_panels_get_no_space() {
        let mut collapsed = input(PlacementType::FlexibleGrowing, 20.0);
        collapsed.collapsed = true;

        let layout = calc_children_layout(
            200.0,
            100.0,
            &[collapsed, input(PlacementType::FlexibleGrowing, 0.0)],
        );

        assert_eq!(heights(&layout), vec![0.0, 100.0]);
    }

    #[test]
    fn static_only_layout_keeps_free_space() {
        let layout = calc_children_layout(
            200.0,
            100.0,
            &[input(PlacementType::Static, 20.0), input(PlacementType::Static, 30.0)],
        );

        assert_eq!(heights(&layout), vec![20.0, 30.0]);
        assert_eq!(layout.free_space, 50.0);
    }

    #[test]
    fn truncation_spares_static_panels() {
        let layout = calc_children_layout(
            200.0,
            100.0,
            &[
                input(PlacementType::FlexibleStatic, 50.0),
                input(PlacementType::FlexibleGrowing, 40.0),
                input(PlacementType::Static, 60.0),
            ],
        );

        assert_eq!(heights(&layout), vec![40.0, 0.0, 60.0]);
        assert_eq!(positions(&layout), vec![0.0, 40.0, 40.0]);
        assert_eq!(layout.free_space, 0.0);

        let layout = calc_children_layout(
            200.0,
            100.0,
            &[
                input(PlacementType::FlexibleStatic, 50.0),
                input(PlacementType::FlexibleGrowing, 70.0),
                input(PlacementType::Static, 20.0),
            ],
        );
        assert_eq!(heights(&layout), vec![50.0, 30.0, 20.0]);
        assert_eq!(layout.free_space, 0.0);
    }

    #[test]
    fn overflowing_static_panels_stay_untouched() {
        let layout = calc_children_layout(
            200.0,
            50.0,
            &[input(PlacementType::Static, 40.0), input(PlacementType::Static, 30.0)],
        );

        assert_eq!(heights(&layout), vec![40.0, 30.0]);
        assert_eq!(layout.free_space, -20.0);
    }

    #[test]
    fn panel_height_reads_numbers_and_flexible() {
        let heights: Vec<PanelHeight> = serde_json::from_str(r#"[24, "flexible"]"#).unwrap();
        assert_eq!(heights, vec![PanelHeight::Fixed(24.0), PanelHeight::Flexible]);
    }

    fn arb_input() -> impl Strategy<Value = LayoutInput> {
        (0..3u8, 0.0..200.0f64, any::<bool>()).prop_map(|(kind, height, collapsed)| LayoutInput {
            placement_type: match kind {
                0 => PlacementType::Static,
                1 => PlacementType::FlexibleGrowing,
                _ => PlacementType::FlexibleStatic,
            },
            height: height.floor(),
            collapsed,
        })
    }

    proptest! {
        #[test]
        fn heights_and_free_space_add_up(
            inputs in prop::collection::vec(arb_input(), 0..8),
            total in 0.0..1000.0f64,
        ) {
            let total = total.floor();
            let layout = calc_children_layout(100.0, total, &inputs);
            let sum: f64 = heights(&layout).iter().sum();

            prop_assert!((sum + layout.free_space - total).abs() < 1e-6);

            let mut position = 0.0;
            for (placement, input) in layout.placements.iter().zip(&inputs) {
                prop_assert!((placement.position - position).abs() < 1e-6);
                prop_assert!(placement.height >= 0.0);
                if input.placement_type == PlacementType::Static && !input.collapsed {
                    prop_assert_eq!(placement.height, input.height);
                }
                position += placement.height;
            }
        }
    }
}
