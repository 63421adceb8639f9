use {
    crate::rig::SkeletonData,
    std::{collections::BTreeMap, convert::TryFrom as _},
};

/// Joint names that are taken as the head when present.
const HEAD_CANDIDATES: [&str; 5] =
    ["head", "joint_113", "joint_112", "joint_111", "nose"];

/// Name fragments of facial joints near the neck.
const FACE_KEYWORDS: [&str; 6] =
    ["nose", "eye", "ear", "joint_11", "joint_12", "jaw"];

/// Finds the bone that should act as the head.
///
/// Probes, in order, the explicit `head` animation target, well known
/// head joint names, facial siblings of the neck and facial children of
/// the neck. Returns `None` when nothing matches.
pub fn resolve_head(
    skeleton: &SkeletonData,
    targets: &BTreeMap<String, i64>,
) -> Option<usize> {
    if let Some(&bone) = targets.get("head") {
        return usize::try_from(bone).ok();
    }

    if let Some(index) = HEAD_CANDIDATES
        .iter()
        .find_map(|candidate| skeleton.find(candidate))
    {
        return Some(index);
    }

    let neck = skeleton.find("neck")?;
    let is_face = |index: usize| {
        let name = &skeleton.joint_names[index];
        FACE_KEYWORDS.iter().any(|keyword| name.contains(keyword))
    };

    if let Some(parent) = skeleton.parent(neck) {
        let sibling = (0..skeleton.len()).find(|&index| {
            index != neck
                && skeleton.parent(index) == Some(parent)
                && is_face(index)
        });
        if sibling.is_some() {
            return sibling;
        }
    }

    (0..skeleton.len())
        .find(|&index| skeleton.parent(index) == Some(neck) && is_face(index))
}

/// Animation targets with the resolved head added under `head`.
pub fn resolve_targets(
    targets: &BTreeMap<String, i64>,
    head: Option<usize>,
) -> BTreeMap<String, usize> {
    let mut resolved: BTreeMap<String, usize> = targets
        .iter()
        .filter_map(|(name, &bone)| Some((name.clone(), usize::try_from(bone).ok()?)))
        .collect();

    if let Some(head) = head {
        resolved.entry("head".to_owned()).or_insert(head);
    }
    resolved
}
