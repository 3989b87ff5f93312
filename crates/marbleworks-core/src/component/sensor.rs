//! Sensors look at each passing ball and report a possibly wrong reading.

use crate::color::{Color, Palette};
use crate::geometry::RelativeSide;
use crate::id::PortId;
use crate::port::{PortSet, PortSpec};
use crate::rng::SimRng;

use super::{
    BallState, ComponentKind, ComponentSpec, EditorMetadata, Glyph, StateDescriptor, VisualHint,
    VisualSpec,
};

pub fn spec() -> ComponentSpec {
    ComponentSpec {
        type_name: "sensor".to_string(),
        kind: ComponentKind::Sensor,
        is_observable: true,
        ports: PortSet::new(
            vec![PortSpec::relative(PortId::IN, RelativeSide::Back)],
            vec![PortSpec::relative(PortId::OUT, RelativeSide::Front)],
        ),
        states: vec![StateDescriptor::new(BallState::Scanning, VisualHint::Inspected)],
        visual: VisualSpec {
            fill: [0x3f, 0x9b, 0x8f],
            glyph: Glyph::Eye,
        },
        editor: EditorMetadata::new("Sensor", "sensor", "inspection"),
    }
}

/// The true color with probability `accuracy`, otherwise a uniformly chosen
/// palette color other than the truth.
pub fn read(truth: Color, accuracy: f64, palette: &Palette, rng: &mut SimRng) -> Color {
    if rng.chance(accuracy) {
        return truth;
    }
    let others: Vec<Color> = palette.iter().filter(|c| *c != truth).collect();
    if others.is_empty() {
        return truth;
    }
    others[rng.below(others.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentParams, InstanceState, on_arrival};
    use crate::fixed::seconds;
    use crate::test_utils::{Workbench, instance};

    #[test]
    fn perfect_sensor_always_reads_truth() {
        let mut rng = SimRng::new(9);
        let palette = Palette::primaries();
        for _ in 0..100 {
            assert_eq!(read(Color::Blue, 1.0, &palette, &mut rng), Color::Blue);
        }
    }

    #[test]
    fn wrong_readings_stay_in_palette() {
        let mut rng = SimRng::new(10);
        let palette = Palette::primaries();
        let mut wrong = 0;
        for _ in 0..1000 {
            let r = read(Color::Red, 0.5, &palette, &mut rng);
            assert!(palette.contains(r));
            if r != Color::Red {
                wrong += 1;
            }
        }
        assert!((400..=600).contains(&wrong), "expected ~500, got {wrong}");
    }

    #[test]
    fn single_color_palette_cannot_misread() {
        let mut rng = SimRng::new(11);
        let palette = Palette::new([Color::Red]).unwrap();
        assert_eq!(read(Color::Red, 0.01, &palette, &mut rng), Color::Red);
    }

    #[test]
    fn noisy_reading_narrows_belief() {
        let spec = spec();
        let params = ComponentParams {
            accuracy: 0.8,
            ..ComponentParams::default()
        };
        let inst = instance(&spec, (0, 0), params);
        let mut bench = Workbench::new(Palette::primaries());
        let ball = bench.ball(Color::Red, &inst);
        let mut state = InstanceState::Sensor {
            rng: SimRng::new(1),
        };
        on_arrival(&mut bench.ctx(seconds(0.0)), &spec, &inst, &mut state, ball, Some(PortId::IN)).unwrap();

        let belief = bench.tracker.belief(ball).unwrap();
        let (_, top) = belief.most_likely().unwrap();
        approx::assert_relative_eq!(top, 0.8, epsilon = 1e-9);
        assert_eq!(bench.tracker.observation_count(ball).unwrap(), 1);
    }
}
