use serde::Serialize;

/// Number of keypoints per person in the COCO layout.
pub const POSE_KEYPOINTS: usize = 17;

/// COCO keypoint layout, in model output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeypointKind {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointKind {
    pub const ALL: [KeypointKind; POSE_KEYPOINTS] = [
        KeypointKind::Nose,
        KeypointKind::LeftEye,
        KeypointKind::RightEye,
        KeypointKind::LeftEar,
        KeypointKind::RightEar,
        KeypointKind::LeftShoulder,
        KeypointKind::RightShoulder,
        KeypointKind::LeftElbow,
        KeypointKind::RightElbow,
        KeypointKind::LeftWrist,
        KeypointKind::RightWrist,
        KeypointKind::LeftHip,
        KeypointKind::RightHip,
        KeypointKind::LeftKnee,
        KeypointKind::RightKnee,
        KeypointKind::LeftAnkle,
        KeypointKind::RightAnkle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeypointKind::Nose => "nose",
            KeypointKind::LeftEye => "left_eye",
            KeypointKind::RightEye => "right_eye",
            KeypointKind::LeftEar => "left_ear",
            KeypointKind::RightEar => "right_ear",
            KeypointKind::LeftShoulder => "left_shoulder",
            KeypointKind::RightShoulder => "right_shoulder",
            KeypointKind::LeftElbow => "left_elbow",
            KeypointKind::RightElbow => "right_elbow",
            KeypointKind::LeftWrist => "left_wrist",
            KeypointKind::RightWrist => "right_wrist",
            KeypointKind::LeftHip => "left_hip",
            KeypointKind::RightHip => "right_hip",
            KeypointKind::LeftKnee => "left_knee",
            KeypointKind::RightKnee => "right_knee",
            KeypointKind::LeftAnkle => "left_ankle",
            KeypointKind::RightAnkle => "right_ankle",
        }
    }
}

/// Limbs drawn by the overlay, as pairs of keypoints.
pub const SKELETON: [(KeypointKind, KeypointKind); 19] = [
    (KeypointKind::LeftAnkle, KeypointKind::LeftKnee),
    (KeypointKind::LeftKnee, KeypointKind::LeftHip),
    (KeypointKind::RightAnkle, KeypointKind::RightKnee),
    (KeypointKind::RightKnee, KeypointKind::RightHip),
    (KeypointKind::LeftHip, KeypointKind::RightHip),
    (KeypointKind::LeftShoulder, KeypointKind::LeftHip),
    (KeypointKind::RightShoulder, KeypointKind::RightHip),
    (KeypointKind::LeftShoulder, KeypointKind::RightShoulder),
    (KeypointKind::LeftShoulder, KeypointKind::LeftElbow),
    (KeypointKind::RightShoulder, KeypointKind::RightElbow),
    (KeypointKind::LeftElbow, KeypointKind::LeftWrist),
    (KeypointKind::RightElbow, KeypointKind::RightWrist),
    (KeypointKind::LeftEye, KeypointKind::RightEye),
    (KeypointKind::Nose, KeypointKind::LeftEye),
    (KeypointKind::Nose, KeypointKind::RightEye),
    (KeypointKind::LeftEye, KeypointKind::LeftEar),
    (KeypointKind::RightEye, KeypointKind::RightEar),
    (KeypointKind::LeftEar, KeypointKind::LeftShoulder),
    (KeypointKind::RightEar, KeypointKind::RightShoulder),
];

/// One estimated landmark in source-frame pixel coordinates.
///
/// `y` grows downward, so a smaller `y` is higher in the image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Expected in [0, 1].
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }
}

/// Keypoints of one detected person, positionally ordered as `KeypointKind`.
///
/// Backends build this straight from model output; the classifier checks the
/// shape before reading it. All 17 entries are kept even though only a few
/// drive the gesture decision.
#[derive(Clone, Debug, PartialEq)]
pub struct PersonPose {
    keypoints: Vec<Keypoint>,
}

impl PersonPose {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }

    pub fn from_array(keypoints: [Keypoint; POSE_KEYPOINTS]) -> Self {
        Self {
            keypoints: keypoints.to_vec(),
        }
    }

    /// Pose with every keypoint at the origin and zero confidence.
    pub fn empty() -> Self {
        Self::from_array([Keypoint::default(); POSE_KEYPOINTS])
    }

    /// Builder-style override of a single keypoint.
    pub fn with(mut self, kind: KeypointKind, keypoint: Keypoint) -> Self {
        if let Some(slot) = self.keypoints.get_mut(kind.index()) {
            *slot = keypoint;
        }
        self
    }

    pub fn get(&self, kind: KeypointKind) -> Option<&Keypoint> {
        self.keypoints.get(kind.index())
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// True when the pose carries exactly the COCO keypoint count.
    pub fn has_canonical_shape(&self) -> bool {
        self.keypoints.len() == POSE_KEYPOINTS
    }
}

/// Every person detected in one frame, in model output order.
///
/// The first entry is treated as the primary subject.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoseDetectionSet {
    people: Vec<PersonPose>,
}

impl PoseDetectionSet {
    pub fn new(people: Vec<PersonPose>) -> Self {
        Self { people }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn primary(&self) -> Option<&PersonPose> {
        self.people.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PersonPose> {
        self.people.iter()
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
}

impl From<Vec<PersonPose>> for PoseDetectionSet {
    fn from(people: Vec<PersonPose>) -> Self {
        Self::new(people)
    }
}
