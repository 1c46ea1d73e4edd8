//! The virtual output row: outputs form a contiguous left-to-right strip
//! whose positions are the prefix sum of the rotated virtual widths.

use sommelier::output::{apply_rotation, reflow_row, OutputMetrics};
use sommelier::transform::{
    host_position_to_guest_position, infer_output_for_guest_position, ScaleState,
};

fn output(x: i32, width: i32, height: i32, transform: u32) -> OutputMetrics {
    let (rw, rh) = apply_rotation(transform, width, height);
    OutputMetrics {
        x,
        width,
        height,
        transform,
        virt_width: width,
        virt_height: height,
        virt_rotated_width: rw,
        virt_rotated_height: rh,
        ..Default::default()
    }
}

fn assert_prefix_sum(outputs: &[OutputMetrics]) {
    let mut expected = 0;
    for o in outputs {
        assert_eq!(o.virt_x, expected);
        expected += o.virt_rotated_width;
    }
}

#[test]
fn row_positions_are_prefix_sums() {
    let mut outputs = vec![
        output(0, 1920, 1080, 0),
        output(1920, 2560, 1440, 0),
        output(4480, 800, 600, 0),
    ];
    reflow_row(outputs.iter_mut());
    assert_prefix_sum(&outputs);
}

#[test]
fn removing_any_output_reflows_the_remainder() {
    for removed in 0..3 {
        let mut outputs = vec![
            output(0, 1920, 1080, 0),
            output(1920, 2560, 1440, 0),
            output(4480, 800, 600, 0),
        ];
        reflow_row(outputs.iter_mut());
        outputs.remove(removed);
        reflow_row(outputs.iter_mut());
        assert_prefix_sum(&outputs);
    }
}

#[test]
fn rotated_outputs_contribute_their_rotated_width() {
    let mut outputs = vec![output(0, 1920, 1080, 0), output(1920, 1920, 1080, 1)];
    reflow_row(outputs.iter_mut());
    assert_eq!(outputs[1].virt_x, 1920);
    // The next output would start after the rotated width.
    assert_eq!(outputs[1].virt_rotated_width, 1080);
}

#[test]
fn guest_positions_resolve_to_the_containing_output() {
    let mut outputs = vec![output(0, 1920, 1080, 0), output(1920, 1280, 1024, 0)];
    reflow_row(outputs.iter_mut());
    let refs: Vec<&OutputMetrics> = outputs.iter().collect();

    assert_eq!(infer_output_for_guest_position(&refs, 0), Some(0));
    assert_eq!(infer_output_for_guest_position(&refs, 1919), Some(0));
    assert_eq!(infer_output_for_guest_position(&refs, 1920), Some(1));
    // Out of bounds clamps to the nearest edge output.
    assert_eq!(infer_output_for_guest_position(&refs, -5), Some(0));
    assert_eq!(infer_output_for_guest_position(&refs, 100_000), Some(1));
}

#[test]
fn host_positions_translate_into_the_virtual_row() {
    // The host puts the second output above-left; virtually it still sits
    // to the right of the first.
    let a = output(0, 1920, 1080, 0);
    let b = output(-800, 1280, 1024, 0);
    let mut outputs = vec![b, a];
    outputs.sort_by_key(|o| o.x);
    reflow_row(outputs.iter_mut());
    let refs: Vec<&OutputMetrics> = outputs.iter().collect();

    let scale = ScaleState::new(1.0, false, false);
    let (mut x, mut y) = (-800 + 40, 30);
    let index = host_position_to_guest_position(&scale, None, &refs, &mut x, &mut y);
    assert_eq!(index, Some(0));
    assert_eq!((x, y), (40, 30));

    let (mut x, mut y) = (500, 500);
    let index = host_position_to_guest_position(&scale, None, &refs, &mut x, &mut y);
    assert_eq!(index, Some(1));
    assert_eq!((x, y), (refs[1].virt_x + 500, 500));
}
