//! Regular 3D image data: the mapper's input dataset.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VolumeError};
use crate::scalars::ScalarArray;
use crate::timestamp::TimeStamp;

/// Where a scalar array lives on the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Association {
    /// One value per grid vertex.
    Point,
    /// One value per grid cell.
    Cell,
    /// Values not tied to the grid topology.
    Field,
}

/// Which attribute collection scalars are taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScalarMode {
    /// Active point scalars, falling back to active cell scalars.
    #[default]
    Default,
    /// Active point scalars only.
    UsePointData,
    /// Active cell scalars only.
    UseCellData,
    /// A point-data array selected by [`ArrayAccess`].
    UsePointFieldData,
    /// A cell-data array selected by [`ArrayAccess`].
    UseCellFieldData,
    /// A field-data array selected by [`ArrayAccess`].
    UseFieldData,
}

/// How an array is selected for the `*FieldData` scalar modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayAccess {
    ById(usize),
    ByName(String),
}

impl Default for ArrayAccess {
    fn default() -> Self {
        Self::ById(0)
    }
}

/// A collection of named arrays with one optional "active scalars" entry.
#[derive(Debug, Clone, Default)]
pub struct AttributeData {
    arrays: Vec<ScalarArray>,
    active: Option<usize>,
}

impl AttributeData {
    /// Adds (or replaces, by name) an array and returns its index.
    pub fn add_array(&mut self, array: ScalarArray) -> usize {
        if let Some(idx) = self.arrays.iter().position(|a| a.name() == array.name()) {
            self.arrays[idx] = array;
            idx
        } else {
            self.arrays.push(array);
            self.arrays.len() - 1
        }
    }

    /// Adds an array and marks it as the active scalars.
    pub fn set_scalars(&mut self, array: ScalarArray) {
        let idx = self.add_array(array);
        self.active = Some(idx);
    }

    /// The active scalars, if any.
    #[must_use]
    pub fn scalars(&self) -> Option<&ScalarArray> {
        self.active.and_then(|idx| self.arrays.get(idx))
    }

    /// Array by position.
    #[must_use]
    pub fn array(&self, idx: usize) -> Option<&ScalarArray> {
        self.arrays.get(idx)
    }

    /// Array by name.
    #[must_use]
    pub fn array_by_name(&self, name: &str) -> Option<&ScalarArray> {
        self.arrays.iter().find(|a| a.name() == name)
    }

    fn lookup(&self, access: &ArrayAccess) -> Option<&ScalarArray> {
        match access {
            ArrayAccess::ById(idx) => self.array(*idx),
            ArrayAccess::ByName(name) => self.array_by_name(name),
        }
    }

    /// Number of arrays.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

/// An axis-aligned regular grid with attached scalar arrays.
#[derive(Debug, Clone)]
pub struct ImageData {
    extent: [i32; 6],
    whole_extent: [i32; 6],
    spacing: DVec3,
    origin: DVec3,
    point_data: AttributeData,
    cell_data: AttributeData,
    field_data: AttributeData,
    mtime: TimeStamp,
}

impl ImageData {
    /// Creates an empty image with the given point extent, spacing and origin.
    pub fn new(extent: [i32; 6], spacing: DVec3, origin: DVec3) -> Result<Self> {
        validate_extent(extent)?;
        Ok(Self {
            extent,
            whole_extent: extent,
            spacing,
            origin,
            point_data: AttributeData::default(),
            cell_data: AttributeData::default(),
            field_data: AttributeData::default(),
            mtime: TimeStamp::now(),
        })
    }

    /// Inclusive point extent `[xmin, xmax, ymin, ymax, zmin, zmax]`.
    #[must_use]
    pub fn extent(&self) -> [i32; 6] {
        self.extent
    }

    /// Extent of the whole dataset this image is a block of.
    #[must_use]
    pub fn whole_extent(&self) -> [i32; 6] {
        self.whole_extent
    }

    /// Declares this image as a sub-block of a larger dataset.
    pub fn set_whole_extent(&mut self, whole_extent: [i32; 6]) -> Result<()> {
        validate_extent(whole_extent)?;
        self.whole_extent = whole_extent;
        self.modified();
        Ok(())
    }

    /// Signed voxel spacing.
    #[must_use]
    pub fn spacing(&self) -> DVec3 {
        self.spacing
    }

    pub fn set_spacing(&mut self, spacing: DVec3) {
        self.spacing = spacing;
        self.modified();
    }

    /// World position of index `(0, 0, 0)`.
    #[must_use]
    pub fn origin(&self) -> DVec3 {
        self.origin
    }

    pub fn set_origin(&mut self, origin: DVec3) {
        self.origin = origin;
        self.modified();
    }

    /// Number of points along each axis.
    #[must_use]
    pub fn dimensions(&self) -> [u32; 3] {
        std::array::from_fn(|i| (self.extent[2 * i + 1] - self.extent[2 * i] + 1).unsigned_abs())
    }

    /// Total number of points.
    #[must_use]
    pub fn number_of_points(&self) -> usize {
        self.dimensions().iter().map(|&d| d as usize).product()
    }

    /// Total number of cells.
    #[must_use]
    pub fn number_of_cells(&self) -> usize {
        self.dimensions()
            .iter()
            .map(|&d| (d as usize).saturating_sub(1).max(1))
            .product()
    }

    /// Point attributes.
    #[must_use]
    pub fn point_data(&self) -> &AttributeData {
        &self.point_data
    }

    /// Cell attributes.
    #[must_use]
    pub fn cell_data(&self) -> &AttributeData {
        &self.cell_data
    }

    /// Field attributes.
    #[must_use]
    pub fn field_data(&self) -> &AttributeData {
        &self.field_data
    }

    /// Sets the active point scalars. The tuple count must match the point count.
    pub fn set_point_scalars(&mut self, array: ScalarArray) -> Result<()> {
        check_tuples(self.number_of_points(), &array)?;
        self.point_data.set_scalars(array);
        self.modified();
        Ok(())
    }

    /// Sets the active cell scalars. The tuple count must match the cell count.
    pub fn set_cell_scalars(&mut self, array: ScalarArray) -> Result<()> {
        check_tuples(self.number_of_cells(), &array)?;
        self.cell_data.set_scalars(array);
        self.modified();
        Ok(())
    }

    /// Adds a non-active point array.
    pub fn add_point_array(&mut self, array: ScalarArray) -> Result<()> {
        check_tuples(self.number_of_points(), &array)?;
        self.point_data.add_array(array);
        self.modified();
        Ok(())
    }

    /// Adds a non-active cell array.
    pub fn add_cell_array(&mut self, array: ScalarArray) -> Result<()> {
        check_tuples(self.number_of_cells(), &array)?;
        self.cell_data.add_array(array);
        self.modified();
        Ok(())
    }

    /// Adds a field array (any length).
    pub fn add_field_array(&mut self, array: ScalarArray) {
        self.field_data.add_array(array);
        self.modified();
    }

    /// Marks the dataset as modified.
    pub fn modified(&mut self) {
        self.mtime.modified();
    }

    /// Last modification time.
    #[must_use]
    pub fn mtime(&self) -> TimeStamp {
        self.mtime
    }

    /// Locates the scalars to render and where they live.
    #[must_use]
    pub fn find_scalars(&self, mode: ScalarMode, access: &ArrayAccess) -> Option<(&ScalarArray, Association)> {
        match mode {
            ScalarMode::Default => self
                .point_data
                .scalars()
                .map(|s| (s, Association::Point))
                .or_else(|| self.cell_data.scalars().map(|s| (s, Association::Cell))),
            ScalarMode::UsePointData => self.point_data.scalars().map(|s| (s, Association::Point)),
            ScalarMode::UseCellData => self.cell_data.scalars().map(|s| (s, Association::Cell)),
            ScalarMode::UsePointFieldData => self.point_data.lookup(access).map(|s| (s, Association::Point)),
            ScalarMode::UseCellFieldData => self.cell_data.lookup(access).map(|s| (s, Association::Cell)),
            ScalarMode::UseFieldData => self.field_data.lookup(access).map(|s| (s, Association::Field)),
        }
    }
}

fn validate_extent(extent: [i32; 6]) -> Result<()> {
    if (0..3).any(|i| extent[2 * i] > extent[2 * i + 1]) {
        return Err(VolumeError::InvalidExtent(extent));
    }
    Ok(())
}

fn check_tuples(expected: usize, array: &ScalarArray) -> Result<()> {
    if array.number_of_tuples() != expected {
        return Err(VolumeError::SizeMismatch {
            expected,
            actual: array.number_of_tuples(),
        });
    }
    Ok(())
}

/// An upstream stage producing the image to render.
pub trait VolumeInput {
    /// Brings the output up to date.
    fn update(&mut self) -> Result<()>;

    /// The current output.
    fn image(&self) -> &ImageData;
}

impl VolumeInput for ImageData {
    fn update(&mut self) -> Result<()> {
        Ok(())
    }

    fn image(&self) -> &ImageData {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(n: i32) -> ImageData {
        ImageData::new([0, n - 1, 0, n - 1, 0, n - 1], DVec3::ONE, DVec3::ZERO).unwrap()
    }

    #[test]
    fn test_rejects_ill_ordered_extent() {
        let err = ImageData::new([0, 4, 3, 2, 0, 1], DVec3::ONE, DVec3::ZERO).unwrap_err();
        assert!(matches!(err, VolumeError::InvalidExtent(_)));
    }

    #[test]
    fn test_counts() {
        let image = cube(4);
        assert_eq!(image.dimensions(), [4, 4, 4]);
        assert_eq!(image.number_of_points(), 64);
        assert_eq!(image.number_of_cells(), 27);
    }

    #[test]
    fn test_modification_bumps_mtime() {
        let mut image = cube(2);
        let before = image.mtime();
        image.set_point_scalars(ScalarArray::single("s", vec![0.0f32; 8])).unwrap();
        assert!(image.mtime() > before);
    }

    #[test]
    fn test_tuple_count_checked() {
        let mut image = cube(2);
        let err = image
            .set_point_scalars(ScalarArray::single("s", vec![0.0f32; 7]))
            .unwrap_err();
        assert!(matches!(err, VolumeError::SizeMismatch { expected: 8, actual: 7 }));
    }

    #[test]
    fn test_default_mode_prefers_points() {
        let mut image = cube(2);
        image.set_cell_scalars(ScalarArray::single("c", vec![1u8])).unwrap();
        let (found, assoc) = image.find_scalars(ScalarMode::Default, &ArrayAccess::default()).unwrap();
        assert_eq!(found.name(), "c");
        assert_eq!(assoc, Association::Cell);

        image.set_point_scalars(ScalarArray::single("p", vec![0u8; 8])).unwrap();
        let (found, assoc) = image.find_scalars(ScalarMode::Default, &ArrayAccess::default()).unwrap();
        assert_eq!(found.name(), "p");
        assert_eq!(assoc, Association::Point);
    }

    #[test]
    fn test_field_lookup_by_name() {
        let mut image = cube(2);
        image.add_field_array(ScalarArray::single("meta", vec![1.0f32, 2.0]));
        let access = ArrayAccess::ByName("meta".into());
        let (found, assoc) = image.find_scalars(ScalarMode::UseFieldData, &access).unwrap();
        assert_eq!(found.name(), "meta");
        assert_eq!(assoc, Association::Field);
        assert!(image
            .find_scalars(ScalarMode::UsePointFieldData, &access)
            .is_none());
    }
}
