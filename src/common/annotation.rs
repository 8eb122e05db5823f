use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::common::YmirError;

/// Integer pixel box in `(x, y, w, h)` form, as the harness expects it.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub class_name: String,
    pub score: f32,
    #[serde(rename = "box")]
    pub bbox: AnnotationBox,
}

impl Annotation {
    /// Builds an annotation from one `(x1, y1, x2, y2, conf, cls)` detection row.
    pub fn from_row(row: ArrayView1<f32>, class_names: &[String]) -> Result<Self, YmirError> {
        let (xmin, ymin, xmax, ymax, conf, cls) = (row[0], row[1], row[2], row[3], row[4], row[5]);

        let index = cls as usize;
        let class_name = class_names
            .get(index)
            .ok_or(YmirError::InvalidClassIndex { index, nc: class_names.len() })?;

        Ok(Self {
            class_name: class_name.clone(),
            score: conf,
            bbox: AnnotationBox {
                x: xmin as i32,
                y: ymin as i32,
                w: (xmax - xmin) as i32,
                h: (ymax - ymin) as i32,
            },
        })
    }
}
