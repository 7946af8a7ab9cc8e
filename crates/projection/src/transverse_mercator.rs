//! Ellipsoidal Transverse Mercator projection.
//!
//! Uses the Krüger n-series (third order), which is accurate to well below a
//! millimetre within a few thousand kilometres of the central meridian. That
//! covers every MGRS tile of a UTM zone, including the overlap regions and the
//! irregular zones around Norway and Svalbard.
//!
//! Reference: Karney, "Transverse Mercator with an accuracy of a few
//! nanometers", J. Geodesy 85 (2011), series truncated at n^3.

/// Reference ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis (meters)
    pub a: f64,
    /// Flattening
    pub f: f64,
}

impl Ellipsoid {
    /// WGS84 ellipsoid.
    pub const WGS84: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_223_563,
    };

    /// First eccentricity.
    pub fn eccentricity(&self) -> f64 {
        (self.f * (2.0 - self.f)).sqrt()
    }

    /// Third flattening n = f / (2 - f).
    pub fn third_flattening(&self) -> f64 {
        self.f / (2.0 - self.f)
    }
}

/// Largest longitude offset from the central meridian accepted by `forward`.
///
/// The series diverges at 90 degrees; anything past this limit is rejected.
pub const MAX_LONGITUDE_OFFSET_DEG: f64 = 80.0;

/// Transverse Mercator projection parameters.
#[derive(Debug, Clone)]
pub struct TransverseMercator {
    /// Central meridian (degrees)
    pub lon0: f64,
    /// Scale factor on the central meridian
    pub k0: f64,
    /// False easting (meters)
    pub false_easting: f64,
    /// False northing (meters)
    pub false_northing: f64,
    /// Ellipsoid
    pub ellipsoid: Ellipsoid,
    /// Rectifying radius A
    a_rect: f64,
    /// First eccentricity
    e: f64,
    /// Forward series coefficients
    alpha: [f64; 3],
    /// Inverse series coefficients
    beta: [f64; 3],
    /// Conformal to geodetic latitude coefficients
    delta: [f64; 3],
}

impl TransverseMercator {
    /// Create a new projection.
    ///
    /// # Arguments
    /// * `lon0` - Central meridian (degrees)
    /// * `k0` - Scale factor on the central meridian
    /// * `false_easting` - Added to every easting (meters)
    /// * `false_northing` - Added to every northing (meters)
    /// * `ellipsoid` - Reference ellipsoid
    pub fn new(
        lon0: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
        ellipsoid: Ellipsoid,
    ) -> Self {
        let n = ellipsoid.third_flattening();
        let n2 = n * n;
        let n3 = n2 * n;

        let a_rect = ellipsoid.a / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
            61.0 * n3 / 240.0,
        ];
        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
            n2 / 48.0 + n3 / 15.0,
            17.0 * n3 / 480.0,
        ];
        let delta = [
            2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
            7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
            56.0 * n3 / 15.0,
        ];

        Self {
            lon0,
            k0,
            false_easting,
            false_northing,
            ellipsoid,
            a_rect,
            e: ellipsoid.eccentricity(),
            alpha,
            beta,
            delta,
        }
    }

    /// Convert geographic coordinates (degrees) to projected (easting, northing) meters.
    ///
    /// Returns None for non-finite input, latitudes outside [-90, 90] or
    /// longitudes too far from the central meridian for the series.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> Option<(f64, f64)> {
        if !lon_deg.is_finite() || !lat_deg.is_finite() || lat_deg.abs() > 90.0 {
            return None;
        }

        let dlon_deg = normalize_longitude(lon_deg - self.lon0);
        if dlon_deg.abs() > MAX_LONGITUDE_OFFSET_DEG {
            return None;
        }

        let phi = lat_deg.to_radians();
        let dlon = dlon_deg.to_radians();

        // Conformal latitude, expressed through t = tan(chi)
        let sin_phi = phi.sin();
        let t = (sin_phi.atanh() - self.e * (self.e * sin_phi).atanh()).sinh();

        let xi_prime = t.atan2(dlon.cos());
        let eta_prime = (dlon.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (j, alpha) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi += alpha * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += alpha * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        let easting = self.false_easting + self.k0 * self.a_rect * eta;
        let northing = self.false_northing + self.k0 * self.a_rect * xi;

        if easting.is_finite() && northing.is_finite() {
            Some((easting, northing))
        } else {
            None
        }
    }

    /// Convert projected (easting, northing) meters back to geographic (lon, lat) degrees.
    pub fn inverse(&self, easting: f64, northing: f64) -> Option<(f64, f64)> {
        if !easting.is_finite() || !northing.is_finite() {
            return None;
        }

        let xi = (northing - self.false_northing) / (self.k0 * self.a_rect);
        let eta = (easting - self.false_easting) / (self.k0 * self.a_rect);

        let mut xi_prime = xi;
        let mut eta_prime = eta;
        for (j, beta) in self.beta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi_prime -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_prime -= beta * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_prime.sin() / eta_prime.cosh()).clamp(-1.0, 1.0).asin();

        let mut phi = chi;
        for (j, delta) in self.delta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            phi += delta * (k * chi).sin();
        }

        let dlon = eta_prime.sinh().atan2(xi_prime.cos());

        let lon = normalize_longitude(self.lon0 + dlon.to_degrees());
        let lat = phi.to_degrees();

        if lon.is_finite() && lat.is_finite() {
            Some((lon, lat))
        } else {
            None
        }
    }
}

/// Wrap a longitude difference into [-180, 180).
pub fn normalize_longitude(mut lon: f64) -> f64 {
    while lon >= 180.0 {
        lon -= 360.0;
    }
    while lon < -180.0 {
        lon += 360.0;
    }
    lon
}
