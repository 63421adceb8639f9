use {nalgebra as na, parry3d::bounding_volume::Aabb};

/// Mean X and Z of root translations, skipping persons without one.
pub fn centroid<I>(roots: I) -> [f32; 2]
where
    I: IntoIterator<Item = Option<[f32; 3]>>,
{
    let (sum, count) = roots
        .into_iter()
        .flatten()
        .fold(([0.0f32, 0.0f32], 0usize), |(sum, count), root| {
            ([sum[0] + root[0], sum[1] + root[2]], count + 1)
        });

    if count == 0 {
        [0.0, 0.0]
    } else {
        [sum[0] / count as f32, sum[1] / count as f32]
    }
}

/// Scene offset of a person.
///
/// X and Z are relative to the centroid with Z flipped. Y lifts the mesh
/// so its lowest bind pose point touches the ground. Persons without
/// root translation stay at the origin.
pub fn placement(
    root: Option<[f32; 3]>,
    center: [f32; 2],
    bounds: Option<&Aabb>,
) -> na::Vector3<f32> {
    let root = match root {
        Some(root) => root,
        None => return na::Vector3::zeros(),
    };

    let y = bounds.map_or(0.0, |aabb| -aabb.mins.y);
    na::Vector3::new(root[0] - center[0], y, -(root[2] - center[1]))
}
