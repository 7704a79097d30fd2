use glam::{Mat4, Vec3};

/// Axis-aligned bounding box. An empty box has `min > max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    pub const EMPTY: AABB = AABB {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(point1: Vec3, point2: Vec3) -> AABB {
        let min = point1.min(point2);
        let max = point1.max(point2);
        AABB { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> AABB {
        points
            .into_iter()
            .fold(AABB::EMPTY, |aabb, point| aabb.expanded_by_point(point))
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expanded_by_point(&self, point: Vec3) -> AABB {
        AABB {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }

        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }

        self.max - self.min
    }

    /// Largest of the three extents, zero for an empty box.
    pub fn max_dimension(&self) -> f32 {
        self.size().max_element()
    }

    pub fn corners(&self) -> [Vec3; 8] {
        [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ]
    }

    /// Box enclosing this box after `matrix` is applied to all of its corners.
    pub fn transformed(&self, matrix: &Mat4) -> AABB {
        if self.is_empty() {
            return AABB::EMPTY;
        }

        AABB::from_points(
            self.corners()
                .map(|corner| matrix.transform_point3(corner)),
        )
    }
}

#[cfg(test)]
mod tests {
    use glam::Quat;

    use super::*;

    #[test]
    fn empty_box_has_zero_size() {
        assert!(AABB::EMPTY.is_empty());
        assert_eq!(AABB::EMPTY.size(), Vec3::ZERO);
        assert_eq!(AABB::EMPTY.max_dimension(), 0.0);
        assert_eq!(AABB::EMPTY.center(), Vec3::ZERO);
    }

    #[test]
    fn from_points_encloses_every_point() {
        let points = [
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-3.0, 4.0, 0.0),
            Vec3::new(0.0, 0.0, 7.0),
        ];
        let aabb = AABB::from_points(points);

        assert_eq!(aabb.min, Vec3::new(-3.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 4.0, 7.0));
        assert!(points.iter().all(|p| p.cmpge(aabb.min).all() && p.cmple(aabb.max).all()));
        assert_eq!(aabb.max_dimension(), 7.0);
    }

    #[test]
    fn transformed_box_follows_rotation() {
        let aabb = AABB::new(Vec3::new(-1.0, 0.0, -2.0), Vec3::new(1.0, 1.0, 2.0));
        let rotation = Mat4::from_quat(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        let rotated = aabb.transformed(&rotation);

        assert!((rotated.size() - Vec3::new(4.0, 1.0, 2.0)).length() < 1e-5);
    }
}
