use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

impl Orientation {
    /// Data axis (0 = x, 1 = y, 2 = z) that is constant across the slice.
    pub fn axis(self) -> usize {
        match self {
            Orientation::Axial => 2,
            Orientation::Coronal => 1,
            Orientation::Sagittal => 0,
        }
    }

    pub fn from_axis(axis: usize) -> Option<Self> {
        match axis {
            0 => Some(Orientation::Sagittal),
            1 => Some(Orientation::Coronal),
            2 => Some(Orientation::Axial),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationType {
    #[default]
    Nearest,
    Linear,
    Cubic,
}

impl InterpolationType {
    pub fn as_str(self) -> &'static str {
        match self {
            InterpolationType::Nearest => "Nearest",
            InterpolationType::Linear => "Linear",
            InterpolationType::Cubic => "Cubic",
        }
    }
}

#[derive(Default)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    UnsignedChar,
    #[default]
    UnsignedShort,
}

impl ScalarType {
    pub fn size(self) -> usize {
        match self {
            ScalarType::UnsignedChar => 1,
            ScalarType::UnsignedShort => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileDimensionality {
    /// One file per slice.
    #[default]
    Two,
    /// The whole volume in a single file.
    Three,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampType {
    Linear,
    #[default]
    SCurve,
    Sqrt,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    #[default]
    Image2D,
    Image3D,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapperKind {
    /// Axis-aligned slice drawn as a colour-mapped texture.
    #[default]
    Direct,
    /// Oblique resampling along the camera's slice plane.
    Reslice,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionOperation {
    #[default]
    Average,
    Sum,
    Minimum,
    Maximum,
}

impl ProjectionOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectionOperation::Average => "Average",
            ProjectionOperation::Sum => "Sum",
            ProjectionOperation::Minimum => "Minimum",
            ProjectionOperation::Maximum => "Maximum",
        }
    }
}
