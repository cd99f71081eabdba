use crate::core::{Coordinate, Country};

const fn point(latitude: f64, longitude: f64) -> Coordinate {
    match Coordinate::new(latitude, longitude) {
        Some(coordinate) => coordinate,
        None => panic!("centroid outside WGS84 bounds"),
    }
}

// evaluated at compile time, so a bad entry fails the build
const UK_CENTROID: Coordinate = point(54.0, -2.5);
const US_CENTROID: Coordinate = point(37.6, -95.7);
const AUSTRALIA_CENTROID: Coordinate = point(-25.3, 133.8);

/// Last-resort point for a whole country.
pub fn country_centroid(country: Country) -> Coordinate {
    match country {
        Country::Uk => UK_CENTROID,
        Country::Us => US_CENTROID,
        Country::Australia => AUSTRALIA_CENTROID,
    }
}

/// Centroid lookup by country name; `None` for countries outside the table.
pub fn centroid(country: &str) -> Option<Coordinate> {
    Country::parse(country).map(country_centroid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_countries() {
        assert_eq!(centroid("UK"), Coordinate::new(54.0, -2.5));
        assert_eq!(centroid("US"), Coordinate::new(37.6, -95.7));
        assert_eq!(centroid("Australia"), Coordinate::new(-25.3, 133.8));
    }

    #[test]
    fn test_centroids_are_valid_points() {
        for country in [Country::Uk, Country::Us, Country::Australia] {
            let point = country_centroid(country);
            assert_eq!(Coordinate::new(point.latitude(), point.longitude()), Some(point));
        }
    }

    #[test]
    fn test_unknown_country_has_no_centroid() {
        assert_eq!(centroid("Canada"), None);
        assert_eq!(centroid(""), None);
    }
}
