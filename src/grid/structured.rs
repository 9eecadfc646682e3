use nalgebra_sparse as nas;

use super::Grid;
use crate::Vec3;

impl Grid {
    /// Construct a 1D grid of `cells` equal cells on an interval of the given length.
    ///
    /// Faces are ordered left to right with normals pointing in +x.
    pub fn line_1d(cells: usize, length: f64) -> Self {
        let dx = length / cells as f64;

        let mut incidence = nas::CooMatrix::new(cells + 1, cells);
        for cell in 0..cells {
            // left face normal points into the cell, right face normal out of it
            incidence.push(cell, cell, -1i8);
            incidence.push(cell + 1, cell, 1i8);
        }

        let face_normals = vec![Vec3::new(1.0, 0.0, 0.0); cells + 1];
        let face_centers: Vec<Vec3> = (0..=cells)
            .map(|i| Vec3::new(i as f64 * dx, 0.0, 0.0))
            .collect();
        let face_areas = vec![1.0; cells + 1];
        let cell_centers: Vec<Vec3> = (0..cells)
            .map(|i| Vec3::new((i as f64 + 0.5) * dx, 0.0, 0.0))
            .collect();

        Grid::new(
            1,
            nas::CsrMatrix::from(&incidence),
            face_normals,
            face_centers,
            face_areas,
            cell_centers,
        )
        .unwrap()
    }

    /// Construct a 2D Cartesian grid with the given cell counts and physical extents.
    ///
    /// Cells are numbered row by row with x running fastest.
    /// Faces with x-normals come first (column by column within each row),
    /// followed by faces with y-normals.
    /// All normals point in the positive axis direction and are scaled by face area.
    pub fn cartesian_2d(cells: [usize; 2], lengths: [f64; 2]) -> Self {
        let [nx, ny] = cells;
        let [lx, ly] = lengths;
        let dx = lx / nx as f64;
        let dy = ly / ny as f64;

        let num_cells = nx * ny;
        let num_x_faces = (nx + 1) * ny;
        let num_faces = num_x_faces + nx * (ny + 1);

        let mut incidence = nas::CooMatrix::new(num_faces, num_cells);
        let mut face_normals = Vec::with_capacity(num_faces);
        let mut face_centers = Vec::with_capacity(num_faces);
        let mut face_areas = Vec::with_capacity(num_faces);

        // faces with x-normals, area dy
        for j in 0..ny {
            for i in 0..=nx {
                let face = j * (nx + 1) + i;
                face_normals.push(Vec3::new(dy, 0.0, 0.0));
                face_centers.push(Vec3::new(i as f64 * dx, (j as f64 + 0.5) * dy, 0.0));
                face_areas.push(dy);
                if i > 0 {
                    incidence.push(face, j * nx + (i - 1), 1i8);
                }
                if i < nx {
                    incidence.push(face, j * nx + i, -1i8);
                }
            }
        }
        // faces with y-normals, area dx
        for j in 0..=ny {
            for i in 0..nx {
                let face = num_x_faces + j * nx + i;
                face_normals.push(Vec3::new(0.0, dx, 0.0));
                face_centers.push(Vec3::new((i as f64 + 0.5) * dx, j as f64 * dy, 0.0));
                face_areas.push(dx);
                if j > 0 {
                    incidence.push(face, (j - 1) * nx + i, 1i8);
                }
                if j < ny {
                    incidence.push(face, j * nx + i, -1i8);
                }
            }
        }

        let cell_centers: Vec<Vec3> = (0..num_cells)
            .map(|c| {
                let (i, j) = (c % nx, c / nx);
                Vec3::new((i as f64 + 0.5) * dx, (j as f64 + 0.5) * dy, 0.0)
            })
            .collect();

        Grid::new(
            2,
            nas::CsrMatrix::from(&incidence),
            face_normals,
            face_centers,
            face_areas,
            cell_centers,
        )
        .unwrap()
    }

    /// Construct a zero-dimensional point grid with a single cell and no faces.
    ///
    /// Used for fracture intersections with no geometric extent.
    pub fn point_0d(center: Vec3) -> Self {
        Grid::new(
            0,
            nas::CsrMatrix::zeros(0, 1),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            vec![center],
        )
        .unwrap()
    }
}
