use ndarray::{Array2, ArrayView2};

use crate::common::YoloBox;

/// Candidates kept for suppression after confidence filtering.
const MAX_NMS: usize = 30000;

pub trait Nms {
    fn iou(&self, other: &Self) -> f32;
    fn confidence(&self) -> f32;
    fn class_id(&self) -> usize;
}

impl Nms for YoloBox {
    /// Computes the intersection over union (IoU) between this bounding box and another.
    fn iou(&self, other: &Self) -> f32 {
        let union = self.union(other);
        if union <= 0. {
            return 0.;
        }
        self.intersect(other) / union
    }

    fn confidence(&self) -> f32 {
        self.conf
    }

    fn class_id(&self) -> usize {
        self.class_id
    }
}

/// Greedy suppression in place, keeping at most `max_det` boxes. Boxes of different
/// classes never suppress each other unless `agnostic` is set.
pub fn nms<T: Nms>(boxes: &mut Vec<T>, iou_threshold: f32, agnostic: bool, max_det: usize) {
    boxes.sort_by(|b1, b2| {
        b2.confidence()
            .partial_cmp(&b1.confidence())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut current_index = 0;
    for index in 0..boxes.len() {
        if current_index >= max_det {
            break;
        }
        let mut drop = false;
        for prev_index in 0..current_index {
            if !agnostic && boxes[prev_index].class_id() != boxes[index].class_id() {
                continue;
            }
            let iou = boxes[prev_index].iou(&boxes[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            boxes.swap(current_index, index);
            current_index += 1;
        }
    }
    boxes.truncate(current_index);
}

/// Filters one image's raw `(anchors, 5 + nc)` YOLOv5 predictions down to
/// `(k, 6)` rows of `x1, y1, x2, y2, conf, cls`.
///
/// A row survives when its objectness and its best `objectness * class score` both
/// exceed `conf_thres`.
pub fn non_max_suppression(
    preds: ArrayView2<f32>,
    conf_thres: f32,
    iou_thres: f32,
    agnostic: bool,
    max_det: usize,
) -> Array2<f32> {
    let mut candidates: Vec<YoloBox> = preds
        .rows()
        .into_iter()
        .filter(|row| row.len() > 5 && row[4] > conf_thres)
        .filter_map(|row| {
            let obj = row[4];
            let (class_id, score) = row
                .iter()
                .skip(5)
                .enumerate()
                .map(|(i, &cls)| (i, cls * obj))
                .max_by(|a, b| a.1.total_cmp(&b.1))?;
            if score <= conf_thres {
                return None;
            }
            Some(
                YoloBox::default()
                    .with_cxcy_wh(row[0], row[1], row[2], row[3])
                    .with_confidence(score)
                    .with_class_id(class_id),
            )
        })
        .collect();

    if candidates.len() > MAX_NMS {
        candidates.sort_by(|a, b| b.conf.total_cmp(&a.conf));
        candidates.truncate(MAX_NMS);
    }

    nms(&mut candidates, iou_thres, agnostic, max_det);

    let flat: Vec<f32> = candidates.iter().flat_map(|b| b.to_row()).collect();
    // length is always rows * 6
    Array2::from_shape_vec((candidates.len(), 6), flat).unwrap_or_else(|_| Array2::zeros((0, 6)))
}
