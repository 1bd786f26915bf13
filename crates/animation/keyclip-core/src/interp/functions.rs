//! Interpolation helpers:
//! - lerp for scalars and fixed-size vectors
//! - cubic Hermite basis used by smooth curve segments
//! - quaternion dot/normalize/multiply/rotate
//! - quaternion NLERP and SLERP with shortest-arc correction
//!
//! Quaternions are stored as `[x, y, z, w]`.

pub const IDENTITY_QUAT: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

#[inline]
pub fn lerp_vec4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
        lerp_f32(a[3], b[3], t),
    ]
}

/// Cubic Hermite between `p0` and `p1` with tangents already scaled to the segment length.
#[inline]
pub fn hermite(p0: f32, m0: f32, p1: f32, m1: f32, s: f32) -> f32 {
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
}

#[inline]
pub fn dot4(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

#[inline]
pub fn negate4(q: [f32; 4]) -> [f32; 4] {
    [-q[0], -q[1], -q[2], -q[3]]
}

/// Normalize a quaternion; a zero-length input yields identity.
#[inline]
pub fn normalize_quat(q: [f32; 4]) -> [f32; 4] {
    let len2 = dot4(q, q);
    if len2 > 0.0 && len2.is_finite() {
        let inv_len = len2.sqrt().recip();
        [q[0] * inv_len, q[1] * inv_len, q[2] * inv_len, q[3] * inv_len]
    } else {
        IDENTITY_QUAT
    }
}

/// Hamilton product `a * b` (apply `b` first, then `a`).
#[inline]
pub fn quat_mul(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    let [ax, ay, az, aw] = a;
    let [bx, by, bz, bw] = b;
    [
        aw * bx + ax * bw + ay * bz - az * by,
        aw * by - ax * bz + ay * bw + az * bx,
        aw * bz + ax * by - ay * bx + az * bw,
        aw * bw - ax * bx - ay * by - az * bz,
    ]
}

/// Inverse of a unit quaternion.
#[inline]
pub fn quat_conjugate(q: [f32; 4]) -> [f32; 4] {
    [-q[0], -q[1], -q[2], q[3]]
}

/// Rotate a vector by a unit quaternion.
#[inline]
pub fn quat_rotate(q: [f32; 4], v: [f32; 3]) -> [f32; 3] {
    let p = [v[0], v[1], v[2], 0.0];
    let r = quat_mul(quat_mul(q, p), quat_conjugate(q));
    [r[0], r[1], r[2]]
}

/// Quaternion NLERP with shortest-arc correction.
/// If dot < 0, negate the second quaternion to ensure the shortest path.
#[inline]
pub fn nlerp_quat(a: [f32; 4], mut b: [f32; 4], t: f32) -> [f32; 4] {
    if dot4(a, b) < 0.0 {
        b = negate4(b);
    }
    normalize_quat(lerp_vec4(a, b, t))
}

/// Spherical interpolation between two rotations along the shortest arc.
pub fn slerp_quat(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let qa = normalize_quat(a);
    let mut qb = normalize_quat(b);

    let mut dot = dot4(qa, qb);
    if dot < 0.0 {
        qb = negate4(qb);
        dot = -dot;
    }

    // Nearly parallel: fall back to NLERP to avoid dividing by sin(~0).
    const DOT_THRESHOLD: f32 = 0.9995;
    if dot > DOT_THRESHOLD {
        return normalize_quat(lerp_vec4(qa, qb, t));
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta_0 = theta_0.sin();
    let s0 = (theta_0 - theta).sin() / sin_theta_0;
    let s1 = theta.sin() / sin_theta_0;

    [
        s0 * qa[0] + s1 * qb[0],
        s0 * qa[1] + s1 * qb[1],
        s0 * qa[2] + s1 * qb[2],
        s0 * qa[3] + s1 * qb[3],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    #[test]
    fn hermite_hits_endpoints() {
        approx(hermite(1.0, 5.0, 3.0, -2.0, 0.0), 1.0, 1e-6);
        approx(hermite(1.0, 5.0, 3.0, -2.0, 1.0), 3.0, 1e-6);
        // Tangents matching the chord reduce to a straight line.
        approx(hermite(0.0, 2.0, 2.0, 2.0, 0.25), 0.5, 1e-6);
    }

    #[test]
    fn quat_rotate_quarter_turn_about_y() {
        let half = std::f32::consts::FRAC_PI_4;
        let q = [0.0, half.sin(), 0.0, half.cos()];
        let v = quat_rotate(q, [1.0, 0.0, 0.0]);
        approx(v[0], 0.0, 1e-5);
        approx(v[2], -1.0, 1e-5);
    }

    #[test]
    fn slerp_takes_short_arc() {
        let a = IDENTITY_QUAT;
        let b = negate4(IDENTITY_QUAT);
        let mid = slerp_quat(a, b, 0.5);
        approx(dot4(mid, a).abs(), 1.0, 1e-5);
    }

    #[test]
    fn conjugate_undoes_rotation() {
        let q = normalize_quat([0.3, -0.2, 0.5, 0.8]);
        let v = [1.0, 2.0, 3.0];
        let back = quat_rotate(quat_conjugate(q), quat_rotate(q, v));
        for i in 0..3 {
            approx(back[i], v[i], 1e-5);
        }
    }
}
