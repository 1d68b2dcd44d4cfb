use std::cmp::Ordering;

use tracing::debug;

use crate::Detection;

/// Intersection over union on normalized corner-form boxes. A zero-area box
/// scores 0 against everything: it never suppresses and is never suppressed.
pub fn iou(a: &Detection, b: &Detection) -> f32 {
    if a.area() <= 0.0 || b.area() <= 0.0 {
        return 0.0;
    }

    let ix_a = a.left.max(b.left);
    let iy_a = a.top.max(b.top);
    let ix_b = a.right().min(b.right());
    let iy_b = a.bottom().min(b.bottom());

    let iw = (ix_b - ix_a).max(0.0);
    let ih = (iy_b - iy_a).max(0.0);
    let inter = iw * ih;
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Greedy per-class non-max suppression. Within each class, candidates are
/// sorted by descending confidence (stable, so ties keep decode order) and a
/// box is dropped when its IOU with an already kept box exceeds the
/// threshold. Output is ordered class-ascending, then confidence-descending.
///
/// `max_detections` keeps the most confident survivors overall, then
/// restores the class-major ordering.
pub fn suppress(
    candidates: Vec<Detection>,
    iou_threshold: f32,
    max_detections: Option<usize>,
) -> Vec<Detection> {
    if candidates.is_empty() {
        return candidates;
    }

    let num_classes = candidates.iter().map(|d| d.class_id).max().unwrap_or(0) + 1;
    let mut kept: Vec<Detection> = Vec::new();

    for class_id in 0..num_classes {
        let mut pool: Vec<&Detection> =
            candidates.iter().filter(|d| d.class_id == class_id).collect();
        pool.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });

        let first_kept = kept.len();
        'outer: for d in pool {
            for k in &kept[first_kept..] {
                if iou(d, k) > iou_threshold {
                    continue 'outer;
                }
            }
            kept.push(d.clone());
        }
    }

    if let Some(cap) = max_detections {
        if kept.len() > cap {
            let mut order: Vec<usize> = (0..kept.len()).collect();
            order.sort_by(|&i, &j| {
                kept[j]
                    .confidence
                    .partial_cmp(&kept[i].confidence)
                    .unwrap_or(Ordering::Equal)
            });
            order.truncate(cap);
            // kept is already class-major, so index order restores it
            order.sort_unstable();
            kept = order.into_iter().map(|i| kept[i].clone()).collect();
        }
    }

    debug!(kept = kept.len(), "suppression complete");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(left: f32, top: f32, width: f32, height: f32, class_id: usize, confidence: f32) -> Detection {
        Detection {
            left,
            top,
            width,
            height,
            class_id,
            label: format!("class{}", class_id),
            confidence,
        }
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = det(0.1, 0.1, 0.4, 0.4, 0, 0.9);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = det(0.0, 0.0, 0.2, 0.2, 0, 0.9);
        let b = det(0.5, 0.5, 0.2, 0.2, 0, 0.8);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn zero_area_box_has_zero_iou() {
        let a = det(0.2, 0.2, 0.0, 0.3, 0, 0.9);
        let b = det(0.0, 0.0, 1.0, 1.0, 0, 0.8);
        assert_eq!(iou(&a, &b), 0.0);
        assert_eq!(iou(&b, &a), 0.0);
    }

    #[test]
    fn heavy_overlap_keeps_only_strongest() {
        // IOU = 0.9: (0,0,1,0.95) vs (0,0.05,1,0.95) -> inter 0.9, union 1.0
        let a = det(0.0, 0.0, 1.0, 0.95, 0, 0.9);
        let b = det(0.0, 0.05, 1.0, 0.95, 0, 0.7);
        assert!((iou(&a, &b) - 0.9).abs() < 1e-5);

        let out = suppress(vec![a, b], 0.5, None);
        assert_eq!(out.len(), 1);
        assert!((out[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn light_overlap_keeps_both() {
        // IOU = 1/3: (0,0,0.6,0.5) vs (0.3,0,0.6,0.5)
        let a = det(0.0, 0.0, 0.6, 0.5, 0, 0.9);
        let b = det(0.3, 0.0, 0.6, 0.5, 0, 0.7);
        assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-5);

        let out = suppress(vec![a, b], 0.5, None);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn iou_exactly_at_threshold_is_kept() {
        // exceeds means strictly greater
        let a = det(0.0, 0.0, 0.6, 0.5, 0, 0.9);
        let b = det(0.3, 0.0, 0.6, 0.5, 0, 0.7);
        let threshold = iou(&a, &b);
        let out = suppress(vec![a, b], threshold, None);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn classes_are_suppressed_independently() {
        let a = det(0.0, 0.0, 1.0, 0.95, 0, 0.9);
        let b = det(0.0, 0.05, 1.0, 0.95, 1, 0.7);
        let out = suppress(vec![a, b], 0.5, None);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn output_is_class_major_confidence_descending() {
        let out = suppress(
            vec![
                det(0.0, 0.0, 0.1, 0.1, 1, 0.6),
                det(0.5, 0.5, 0.1, 0.1, 0, 0.4),
                det(0.0, 0.5, 0.1, 0.1, 1, 0.9),
                det(0.5, 0.0, 0.1, 0.1, 0, 0.8),
            ],
            0.5,
            None,
        );
        let order: Vec<(usize, f32)> = out.iter().map(|d| (d.class_id, d.confidence)).collect();
        assert_eq!(order, vec![(0, 0.8), (0, 0.4), (1, 0.9), (1, 0.6)]);
    }

    #[test]
    fn confidence_ties_keep_insertion_order() {
        let first = det(0.0, 0.0, 0.1, 0.1, 0, 0.5);
        let second = det(0.8, 0.8, 0.1, 0.1, 0, 0.5);
        let out = suppress(vec![first.clone(), second.clone()], 0.5, None);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].left, first.left);
        assert_eq!(out[1].left, second.left);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(suppress(Vec::new(), 0.5, None).is_empty());
    }

    #[test]
    fn cap_keeps_most_confident_survivors() {
        let out = suppress(
            vec![
                det(0.0, 0.0, 0.1, 0.1, 0, 0.3),
                det(0.5, 0.5, 0.1, 0.1, 1, 0.9),
                det(0.0, 0.5, 0.1, 0.1, 2, 0.7),
            ],
            0.5,
            Some(2),
        );
        assert_eq!(out.len(), 2);
        // class-major order of the two strongest
        assert_eq!(out[0].class_id, 1);
        assert_eq!(out[1].class_id, 2);
    }

    #[test]
    fn kept_pairs_stay_under_threshold() {
        let threshold = 0.4;
        let candidates = vec![
            det(0.00, 0.00, 0.50, 0.50, 0, 0.9),
            det(0.10, 0.10, 0.50, 0.50, 0, 0.8),
            det(0.05, 0.00, 0.50, 0.50, 0, 0.7),
            det(0.60, 0.60, 0.30, 0.30, 0, 0.6),
            det(0.55, 0.55, 0.40, 0.40, 0, 0.5),
        ];
        let out = suppress(candidates, threshold, None);
        for i in 0..out.len() {
            for j in (i + 1)..out.len() {
                assert!(iou(&out[i], &out[j]) <= threshold);
            }
        }
        // and confidence never increases within the class
        for pair in out.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }
}
