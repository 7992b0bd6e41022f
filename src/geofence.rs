//! Geofence admission gate - Controllo di ammissione geografica
//!
//! Computazione pura, senza stato: distanza sul cerchio massimo (haversine)
//! e decisione di ammissione. I partecipanti esistenti sono sempre ammessi
//! anche se nel frattempo sono usciti dal raggio.

use crate::entities::Geofence;

/// Raggio medio terrestre in metri
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Coordinate riportate dal geolocation provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Esito del controllo di ammissione
#[derive(Debug, Clone, PartialEq)]
pub struct AccessDecision {
    pub can_access: bool,
    pub reason: Option<&'static str>,
    pub distance_meters: Option<f64>,
}

impl AccessDecision {
    fn allowed(distance_meters: Option<f64>) -> Self {
        AccessDecision {
            can_access: true,
            reason: None,
            distance_meters,
        }
    }

    fn denied(reason: &'static str, distance_meters: Option<f64>) -> Self {
        AccessDecision {
            can_access: false,
            reason: Some(reason),
            distance_meters,
        }
    }
}

/// Distanza sul cerchio massimo tra due punti, in metri (formula haversine)
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (delta_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Decide l'ammissione all'evento:
/// - nessun geofence configurato -> sempre ammesso
/// - partecipante esistente -> sempre ammesso
/// - posizione non disponibile -> negato ("location unavailable")
/// - altrimenti confronto con il raggio, bordo incluso
pub fn check_access(
    user_location: Option<&GeoPoint>,
    geofence: Option<&Geofence>,
    is_participant: bool,
) -> AccessDecision {
    let Some(fence) = geofence else {
        return AccessDecision::allowed(None);
    };

    if is_participant {
        return AccessDecision::allowed(None);
    }

    let Some(location) = user_location else {
        return AccessDecision::denied("location unavailable", None);
    };

    let center = GeoPoint {
        latitude: fence.latitude,
        longitude: fence.longitude,
    };
    let distance = haversine_distance(location, &center);
    if distance <= fence.radius_meters {
        AccessDecision::allowed(Some(distance))
    } else {
        AccessDecision::denied("outside geofence radius", Some(distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fence(radius_meters: f64) -> Geofence {
        Geofence {
            latitude: 0.0,
            longitude: 0.0,
            radius_meters,
            location_name: None,
        }
    }

    /// Un grado di latitudine vale circa 111.19 km sul meridiano
    #[test]
    fn haversine_matches_known_distance() {
        let origin = GeoPoint {
            latitude: 0.0,
            longitude: 0.0,
        };
        let one_degree_north = GeoPoint {
            latitude: 1.0,
            longitude: 0.0,
        };
        let distance = haversine_distance(&origin, &one_degree_north);
        assert!((distance - 111_195.0).abs() < 100.0, "got {}", distance);
    }

    #[test]
    fn no_geofence_always_allows() {
        let decision = check_access(None, None, false);
        assert!(decision.can_access);
        assert_eq!(decision.distance_meters, None);
    }

    #[test]
    fn participants_are_grandfathered_in() {
        // partecipante ben oltre il raggio: ammesso comunque
        let far_away = GeoPoint {
            latitude: 10.0,
            longitude: 10.0,
        };
        let decision = check_access(Some(&far_away), Some(&fence(100.0)), true);
        assert!(decision.can_access);
    }

    #[test]
    fn missing_location_denies_access() {
        let decision = check_access(None, Some(&fence(100.0)), false);
        assert!(!decision.can_access);
        assert_eq!(decision.reason, Some("location unavailable"));
    }

    #[test]
    fn outside_radius_denies_with_distance() {
        // ~150 m a nord dell'origine (1 grado ≈ 111195 m)
        let user = GeoPoint {
            latitude: 150.0 / 111_195.0,
            longitude: 0.0,
        };
        let decision = check_access(Some(&user), Some(&fence(100.0)), false);
        assert!(!decision.can_access);
        assert_eq!(decision.reason, Some("outside geofence radius"));
        let distance = decision.distance_meters.expect("distance computed");
        assert!((distance - 150.0).abs() < 1.0, "got {}", distance);
    }

    #[test]
    fn boundary_distance_is_inside() {
        let user = GeoPoint {
            latitude: 100.0 / 111_195.0,
            longitude: 0.0,
        };
        let distance = haversine_distance(
            &user,
            &GeoPoint {
                latitude: 0.0,
                longitude: 0.0,
            },
        );
        // raggio esattamente pari alla distanza calcolata: il bordo è dentro
        let decision = check_access(Some(&user), Some(&fence(distance)), false);
        assert!(decision.can_access);
        assert_eq!(decision.distance_meters, Some(distance));
    }
}
