//! Hit testing, point selection and the selection marquee.

use crate::geo::Rect;
use crate::map::chart::MapChart;
use crate::map::events::ChartEvent;
use crate::map::geometry::GeoFeature;
use crate::map::series::SeriesType;
use crate::map::state::{Consistency, ConsistencyState};

/// A rubber-band selection in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marquee {
    pub start: (f64, f64),
    pub current: (f64, f64),
}

impl Marquee {
    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.start.0, self.start.1, self.current.0, self.current.1)
    }
}

impl MapChart {
    /// Topmost feature under a screen point.
    pub fn feature_at(&self, sx: f64, sy: f64) -> Option<&GeoFeature> {
        let point = self.inverse_transform(sx, sy);
        if !point.x.is_finite() || !point.y.is_finite() {
            return None;
        }
        let id = self.grid.hit(&self.features, point.x, point.y)?;
        self.features.get(id)
    }

    /// Screen rectangle of a feature at the current zoom.
    pub fn feature_screen_bounds(&self, id: &str) -> Option<Rect> {
        let local = self.feature_local_bounds(id)?;
        let (x1, y1) = self.local_to_screen(local.left, local.top);
        let (x2, y2) = self.local_to_screen(local.right(), local.bottom());
        Some(Rect::from_corners(x1, y1, x2, y2))
    }

    /// Select every point touching `rect`: markers by their center, regions
    /// by their bounds. Replaces the previous selection and emits
    /// `PointsSelect`.
    pub fn select_by_rect(&mut self, rect: Rect) -> Vec<(usize, usize)> {
        let mut points = Vec::new();
        let mut regions = Vec::new();
        for series in self.series.iter() {
            if !series.enabled() {
                continue;
            }
            let hits: Vec<usize> = match series.series_type() {
                SeriesType::Choropleth => series
                    .points()
                    .enumerate()
                    .filter_map(|(index, point)| {
                        let id = point.id.as_deref()?;
                        let bounds = self.feature_screen_bounds(id)?;
                        bounds.intersects(&rect).then(|| {
                            regions.push(id.to_string());
                            index
                        })
                    })
                    .collect(),
                SeriesType::Bubble | SeriesType::Marker => series
                    .markers()
                    .iter()
                    .filter(|marker| rect.contains(marker.x, marker.y))
                    .map(|marker| marker.index)
                    .collect(),
            };
            points.extend(hits.into_iter().map(|index| (series.index(), index)));
        }
        self.apply_selection(points.clone(), regions);
        points
    }

    /// Select the points under a screen point, regions first then markers.
    pub fn select_at(&mut self, sx: f64, sy: f64) -> Vec<(usize, usize)> {
        let region = self.feature_at(sx, sy).and_then(|feature| feature.id.clone());
        let mut points = Vec::new();
        for series in self.series.iter() {
            if !series.enabled() {
                continue;
            }
            let hits: Vec<usize> = match series.series_type() {
                SeriesType::Choropleth => series
                    .points()
                    .enumerate()
                    .filter(|(_, point)| region.is_some() && point.id == region)
                    .map(|(index, _)| index)
                    .collect(),
                SeriesType::Bubble | SeriesType::Marker => series
                    .markers()
                    .iter()
                    .filter(|m| (m.x - sx).hypot(m.y - sy) <= m.radius.max(1.0))
                    .map(|m| m.index)
                    .collect(),
            };
            points.extend(hits.into_iter().map(|index| (series.index(), index)));
        }
        let regions = region.into_iter().filter(|_| !points.is_empty()).collect();
        self.apply_selection(points.clone(), regions);
        points
    }

    pub fn clear_selection(&mut self) {
        self.apply_selection(Vec::new(), Vec::new());
    }

    fn apply_selection(&mut self, points: Vec<(usize, usize)>, regions: Vec<String>) {
        for series in self.series.iter_mut() {
            let index = series.index();
            let selected: Vec<usize> =
                points.iter().filter(|(s, _)| *s == index).map(|&(_, point)| point).collect();
            series.select(&selected);
        }
        self.selected_features = regions.into_iter().collect();
        self.invalidate_state(ConsistencyState::APPEARANCE | ConsistencyState::SERIES | ConsistencyState::LABELS);
        self.events.emit(ChartEvent::PointsSelect { points });
    }

    pub fn selected_features(&self) -> impl Iterator<Item = &str> {
        self.selected_features.iter().map(String::as_str)
    }

    pub fn marquee(&self) -> Option<Marquee> {
        self.marquee
    }

    pub fn start_select_marquee(&mut self, sx: f64, sy: f64) {
        let marquee = Marquee { start: (sx, sy), current: (sx, sy) };
        self.marquee = Some(marquee);
        self.events.emit(ChartEvent::SelectMarqueeStart { rect: marquee.rect() });
    }

    pub fn update_select_marquee(&mut self, sx: f64, sy: f64) {
        let Some(marquee) = self.marquee.as_mut() else { return };
        marquee.current = (sx, sy);
        let rect = marquee.rect();
        self.events.emit(ChartEvent::SelectMarqueeChange { rect });
    }

    /// Close the marquee and select what it covers.
    pub fn finish_select_marquee(&mut self) -> Vec<(usize, usize)> {
        let Some(marquee) = self.marquee.take() else { return Vec::new() };
        let rect = marquee.rect();
        self.events.emit(ChartEvent::SelectMarqueeFinish { rect });
        self.select_by_rect(rect)
    }

    pub fn cancel_select_marquee(&mut self) {
        self.marquee = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::chart::tests::chart;
    use crate::map::chart::SELECTED_FILL;
    use crate::map::series::{DataPoint, MapSeries};

    #[test]
    fn test_feature_at_follows_zoom() {
        let mut chart = chart();
        assert_eq!(chart.feature_at(20.0, 80.0).and_then(|f| f.id.as_deref()), Some("FR"));
        assert!(chart.feature_at(50.0, 50.0).is_none());

        chart.zoom_to(2.0, None, None, None);
        chart.draw();
        assert!(chart.feature_at(50.0, 50.0).is_none());
        assert_eq!(chart.feature_at(10.0, 90.0).and_then(|f| f.id.as_deref()), Some("FR"));
    }

    #[test]
    fn test_select_regions_by_rect() {
        let mut chart = chart();
        chart.add_series(Box::new(MapSeries::choropleth(vec![
            DataPoint::region("FR", 1.0),
            DataPoint::region("DE", 2.0),
        ])));
        chart.draw();
        chart.drain_events();

        let points = chart.select_by_rect(Rect::new(0.0, 50.0, 50.0, 50.0));
        assert_eq!(points, vec![(0, 0)]);
        assert_eq!(chart.selected_features().collect::<Vec<_>>(), vec!["FR"]);

        chart.draw();
        let fill = chart.map_layer().elements().iter().find(|p| p.tag.as_deref() == Some("FR")).and_then(|p| p.fill);
        assert_eq!(fill, Some(SELECTED_FILL));
        assert_eq!(chart.drain_events(), vec![ChartEvent::PointsSelect { points: vec![(0, 0)] }]);
    }

    #[test]
    fn test_marquee_selects_markers() {
        let mut chart = chart();
        chart.add_series(Box::new(MapSeries::bubble(vec![
            DataPoint::at(20.0, 20.0, 5.0),
            DataPoint::at(80.0, 80.0, 5.0),
        ])));
        chart.draw();
        chart.drain_events();

        chart.start_select_marquee(10.0, 70.0);
        chart.update_select_marquee(30.0, 90.0);
        let points = chart.finish_select_marquee();
        assert_eq!(points, vec![(0, 0)]);
        assert!(chart.marquee().is_none());

        let rect = Rect::new(10.0, 70.0, 20.0, 20.0);
        assert_eq!(
            chart.drain_events(),
            vec![
                ChartEvent::SelectMarqueeStart { rect: Rect::new(10.0, 70.0, 0.0, 0.0) },
                ChartEvent::SelectMarqueeChange { rect },
                ChartEvent::SelectMarqueeFinish { rect },
                ChartEvent::PointsSelect { points: vec![(0, 0)] },
            ]
        );
        assert_eq!(chart.series().get(0).map(|s| s.selected()), Some(vec![0]));
    }

    #[test]
    fn test_click_selects_region() {
        let mut chart = chart();
        chart.add_series(Box::new(MapSeries::choropleth(vec![DataPoint::region("DE", 2.0)])));
        chart.draw();
        assert_eq!(chart.select_at(80.0, 80.0), vec![(0, 0)]);
        assert_eq!(chart.select_at(20.0, 20.0), Vec::<(usize, usize)>::new());
        assert_eq!(chart.selected_features().count(), 0);
    }
}
